//! Output sink for analysis results.
//!
//! Every analysis persists its result table before returning its summary.
//! [`FileSink`] writes a directory of part files, replacing whatever was at
//! the destination before.

use crate::prelude::*;
use arrow::array::AsArray;
use arrow::datatypes::UInt64Type;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::common::config::CsvOptions;
use datafusion::dataframe::{DataFrame, DataFrameWriteOptions};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, instrument};

/// Serialization format of a written result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Parquet,
    Csv,
    Json,
}

impl OutputFormat {
    /// File extension of the part files written in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CrashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "csv" => Ok(OutputFormat::Csv),
            "json" | "ndjson" => Ok(OutputFormat::Json),
            other => Err(CrashError::Configuration(format!(
                "Unsupported output format '{other}' (expected parquet, csv or json)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Destination and format of one analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: String,
    pub format: OutputFormat,
}

impl OutputTarget {
    pub fn new(path: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// The destination as a directory location, which makes DataFusion
    /// write part files beneath it rather than a single file.
    fn directory(&self) -> String {
        if self.path.ends_with('/') {
            self.path.clone()
        } else {
            format!("{}/", self.path)
        }
    }
}

/// Persists result tables.
#[async_trait]
pub trait OutputSink: fmt::Debug + Send + Sync {
    /// Writes `frame` to `target`, replacing any previous result there.
    async fn write(&self, frame: DataFrame, target: &OutputTarget) -> Result<()>;
}

/// Writes results to the local filesystem with overwrite semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl FileSink {
    pub fn new() -> Self {
        Self
    }

    async fn clear_destination(path: &str) -> Result<()> {
        let path = Path::new(path.trim_end_matches('/'));
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await?,
            Ok(_) => tokio::fs::remove_file(path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Sums the row counts DataFusion reports back from a write.
fn rows_written(report: &[RecordBatch]) -> u64 {
    report
        .iter()
        .filter(|batch| batch.num_columns() > 0)
        .filter_map(|batch| batch.column(0).as_primitive_opt::<UInt64Type>())
        .map(|counts| counts.iter().flatten().sum::<u64>())
        .sum()
}

#[async_trait]
impl OutputSink for FileSink {
    #[instrument(skip(self, frame), fields(output.path = %target.path, output.format = %target.format))]
    async fn write(&self, frame: DataFrame, target: &OutputTarget) -> Result<()> {
        Self::clear_destination(&target.path).await?;

        let directory = target.directory();
        let options = DataFrameWriteOptions::new();
        let report = match target.format {
            OutputFormat::Parquet => frame.write_parquet(&directory, options, None).await?,
            OutputFormat::Csv => {
                let csv = CsvOptions {
                    has_header: Some(true),
                    ..Default::default()
                };
                frame.write_csv(&directory, options, Some(csv)).await?
            }
            OutputFormat::Json => frame.write_json(&directory, options, None).await?,
        };

        info!(
            output.path = %target.path,
            output.rows = rows_written(&report),
            "Result written"
        );
        Ok(())
    }
}
