//! DataFusion session management for the crash analyses.
//!
//! [`CrashContext`] owns the DataFusion [`SessionContext`] that every
//! analysis runs on. It is created explicitly by the driver and releases
//! every table it registered when dropped.

use crate::prelude::*;
use crate::sources::DataSource;
use datafusion::dataframe::DataFrame;
use datafusion::datasource::TableProvider;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Engine settings, read from the optional `ENGINE` settings section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrashContextConfig {
    /// Rows per record batch
    pub batch_size: usize,
    /// Partitions each scan and join is split into
    pub target_partitions: usize,
    /// Memory budget in bytes before operators spill to disk
    pub max_memory: usize,
}

impl Default for CrashContextConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            max_memory: 2 << 30,
        }
    }
}

/// The session the six crash tables are registered with.
///
/// # Examples
///
/// ```rust,no_run
/// use crash_analysis::core::CrashContext;
/// use crash_analysis::sources::CsvSource;
///
/// # async fn example() -> crash_analysis::error::Result<()> {
/// let mut ctx = CrashContext::new()?;
/// ctx.register_source("units", &CsvSource::new("data/Units_use.csv")?).await?;
/// let units = ctx.table("units").await?;
/// # Ok(())
/// # }
/// ```
pub struct CrashContext {
    inner: SessionContext,
    tables: HashMap<String, Arc<dyn TableProvider>>,
    config: CrashContextConfig,
}

impl CrashContext {
    /// A session with the default engine settings.
    #[instrument]
    pub fn new() -> Result<Self> {
        Self::with_config(CrashContextConfig::default())
    }

    /// A session sized by `config`. Zero batch size or partition count is
    /// rejected.
    #[instrument(skip(config))]
    pub fn with_config(config: CrashContextConfig) -> Result<Self> {
        if config.batch_size == 0 || config.target_partitions == 0 {
            return Err(CrashError::Configuration(
                "batch_size and target_partitions must be greater than zero".to_string(),
            ));
        }

        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions);

        let pool: Arc<dyn MemoryPool> = Arc::new(FairSpillPool::new(config.max_memory));
        let runtime = RuntimeEnvBuilder::new()
            .with_memory_pool(pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        debug!(
            batch_size = config.batch_size,
            target_partitions = config.target_partitions,
            max_memory = config.max_memory,
            "Session created"
        );
        Ok(Self {
            inner: SessionContext::new_with_config_rt(session_config, runtime),
            tables: HashMap::new(),
            config,
        })
    }

    /// The wrapped DataFusion session.
    pub fn inner(&self) -> &SessionContext {
        &self.inner
    }

    /// Settings the session was built with.
    pub fn config(&self) -> &CrashContextConfig {
        &self.config
    }

    /// Names of the tables registered through this context.
    pub fn registered_tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Registers a data source under `name` and tracks it for cleanup.
    #[instrument(skip(self, source), fields(table.name = %name, source = %source.description()))]
    pub async fn register_source(&mut self, name: &str, source: &dyn DataSource) -> Result<()> {
        source.register(&self.inner, name).await?;

        let provider = self.inner.table_provider(name).await?;
        self.tables.insert(name.to_string(), provider);

        debug!(table.name = %name, "Table registered");
        Ok(())
    }

    /// Registers an in-memory or otherwise prebuilt table.
    pub fn register_table_provider(
        &mut self,
        name: &str,
        provider: Arc<dyn TableProvider>,
    ) -> Result<()> {
        self.inner.register_table(name, provider.clone())?;
        self.tables.insert(name.to_string(), provider);
        Ok(())
    }

    /// Returns a lazy [`DataFrame`] over a registered table.
    pub async fn table(&self, name: &str) -> Result<DataFrame> {
        if !self.has_table(name) {
            return Err(CrashError::Configuration(format!(
                "Table '{name}' has not been registered"
            )));
        }
        Ok(self.inner.table(name).await?)
    }

    /// Removes `name` from the session.
    pub fn deregister_table(&mut self, name: &str) -> Result<()> {
        self.inner.deregister_table(name)?;
        self.tables.remove(name);
        Ok(())
    }

    /// Removes every table this context registered.
    pub fn clear_tables(&mut self) -> Result<()> {
        let names: Vec<String> = self.tables.keys().cloned().collect();
        for name in names {
            self.deregister_table(&name)?;
        }
        Ok(())
    }
}

impl Drop for CrashContext {
    fn drop(&mut self) {
        if let Err(e) = self.clear_tables() {
            tracing::warn!(error = %e, "Could not release crash tables");
        }
    }
}
