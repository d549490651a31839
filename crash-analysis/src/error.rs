//! Error types for the crash analysis library.
//!
//! All fallible operations return [`CrashError`] through the [`Result`] alias.
//! Nothing is retried: configuration errors abort before any table is read,
//! data errors abort at the first operation that touches the bad column, and
//! write errors abort the run.

use thiserror::Error;

/// The main error type for the crash analysis library.
#[derive(Error, Debug)]
pub enum CrashError {
    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from data source operations.
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g., "csv")
        source_type: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A table is missing one of the columns the analyses rely on.
    #[error("Column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An analysis failed; carries the analysis name for the final report.
    #[error("Analysis '{analysis}' failed: {source}")]
    AnalysisFailed {
        analysis: String,
        #[source]
        source: Box<CrashError>,
    },
}

/// A type alias for `Result<T, CrashError>`.
pub type Result<T> = std::result::Result<T, CrashError>;

impl CrashError {
    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a missing column error.
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Wraps an error with the name of the analysis that produced it.
    pub fn analysis_failed(analysis: impl Into<String>, source: CrashError) -> Self {
        Self::AnalysisFailed {
            analysis: analysis.into(),
            source: Box::new(source),
        }
    }
}
