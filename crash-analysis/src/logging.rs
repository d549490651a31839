//! Logging setup for crash analysis runs.
//!
//! Logs are structured `tracing` events written to stderr, leaving stdout to
//! the analysis summaries.

/// Utilities for installing the global `tracing` subscriber.
pub mod setup {
    use crate::error::{CrashError, Result};
    use tracing::Level;

    /// Verbosity and format of the log stream.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for dependencies such as DataFusion
        pub level: Level,
        /// Log level for this crate specifically
        pub crate_level: Level,
        /// One JSON object per event instead of plain lines
        pub json_format: bool,
        /// Full filter directive replacing the two levels
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON events, warnings from dependencies, info from this crate.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Plain events with debug output from this crate.
        pub fn development() -> Self {
            Self {
                level: Level::INFO,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The directive used when `RUST_LOG` is unset.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},crash_analysis={}",
                    self.level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs the global subscriber. `RUST_LOG` takes precedence over the
    /// configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use crash_analysis::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| CrashError::Configuration(format!("Logging already initialized: {e}")))
    }
}
