//! Data source connectors for the crash tables.
//!
//! The crash extracts are delimited text with a header row. A table location
//! may name a single file, a directory of files, or a glob pattern.

use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::fmt::Debug;

mod csv;

pub use csv::{CsvOptions, CsvSource};

/// A data source that can be registered with a DataFusion context.
///
/// # Examples
///
/// ```rust,no_run
/// use crash_analysis::sources::{CsvSource, DataSource};
/// use datafusion::prelude::SessionContext;
///
/// # async fn example() -> crash_analysis::error::Result<()> {
/// let source = CsvSource::new("data/Charges_use.csv")?;
/// let ctx = SessionContext::new();
/// source.register(&ctx, "charges").await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Registers this data source with the given session context.
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()>;

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}

/// Returns true when `location` should be expanded as a glob pattern.
pub(crate) fn is_glob_pattern(location: &str) -> bool {
    location.contains(['*', '?', '['])
}

/// Expands glob patterns into file paths.
pub(crate) async fn expand_globs(patterns: &[String]) -> Result<Vec<String>> {
    use glob::glob;

    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob(pattern).map_err(|e| {
            CrashError::Configuration(format!("Invalid glob pattern '{pattern}': {e}"))
        })?;

        for entry in matches {
            let path = entry.map_err(|e| {
                CrashError::data_source_with_source("file", "Unreadable glob match", Box::new(e))
            })?;

            if path.is_file() {
                if let Some(path_str) = path.to_str() {
                    paths.push(path_str.to_string());
                }
            }
        }
    }

    if paths.is_empty() {
        return Err(CrashError::data_source(
            "file",
            format!("No files found matching {patterns:?}"),
        ));
    }

    paths.sort();
    Ok(paths)
}
