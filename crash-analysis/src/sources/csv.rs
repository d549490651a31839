//! Delimited text inputs.

use super::{expand_globs, is_glob_pattern, DataSource};
use crate::prelude::*;
use arrow::datatypes::{DataType, Field, Schema};
use async_trait::async_trait;
use datafusion::error::DataFusionError;
use datafusion::prelude::*;
use std::path::Path;
use tracing::{debug, info, instrument};

/// How a CSV input is parsed.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// First line names the columns
    pub has_header: bool,
    pub delimiter: u8,
    pub quote: u8,
    /// Rows sampled when inferring column types
    pub schema_infer_max_records: usize,
    /// Keep inferred column types. When false every column is read as text
    /// and typing is left to the caller, so a stray value far into the
    /// file cannot fail the scan.
    pub infer_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            schema_infer_max_records: 1000,
            infer_types: false,
        }
    }
}

/// A delimited-text source. Columns are read as text unless
/// [`CsvOptions::infer_types`] is set.
///
/// # Examples
///
/// ```rust,no_run
/// use crash_analysis::sources::{CsvOptions, CsvSource};
///
/// # async fn example() -> crash_analysis::error::Result<()> {
/// let units = CsvSource::new("data/Units_use.csv")?;
///
/// let options = CsvOptions {
///     delimiter: b'|',
///     ..Default::default()
/// };
/// let charges = CsvSource::with_options("data/Charges_use.txt", options)?;
///
/// let parts = CsvSource::from_location("data/persons/*.csv").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CsvSource {
    paths: Vec<String>,
    options: CsvOptions,
}

impl CsvSource {
    /// A source over one file, or every `.csv` file in a directory.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        Self::with_options(path, CsvOptions::default())
    }

    pub fn with_options(path: impl Into<String>, options: CsvOptions) -> Result<Self> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(CrashError::Configuration("Empty CSV location".to_string()));
        }
        Ok(Self {
            paths: vec![path],
            options,
        })
    }

    /// A source over an explicit list of files.
    pub fn from_paths(paths: Vec<String>) -> Result<Self> {
        if paths.is_empty() {
            return Err(CrashError::Configuration("No CSV files given".to_string()));
        }
        Ok(Self {
            paths,
            options: CsvOptions::default(),
        })
    }

    /// Creates a CSV source from a configured location, expanding it first
    /// when it is a glob pattern.
    pub async fn from_location(location: &str) -> Result<Self> {
        if is_glob_pattern(location) {
            let paths = expand_globs(&[location.to_string()]).await?;
            Self::from_paths(paths)
        } else {
            Self::new(location)
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Fails with the offending location when an input is missing or a
    /// directory holds no CSV files.
    fn ensure_readable(&self) -> Result<()> {
        for location in &self.paths {
            let path = Path::new(location);
            if !path.exists() {
                return Err(CrashError::data_source(
                    "csv",
                    format!("Input not found: {location}"),
                ));
            }
            if path.is_dir() {
                let has_csv = std::fs::read_dir(path)?
                    .filter_map(|entry| entry.ok())
                    .any(|entry| entry.path().extension().is_some_and(|ext| ext == "csv"));
                if !has_csv {
                    return Err(CrashError::data_source(
                        "csv",
                        format!("No CSV files in {location}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn read_options<'a>(&self, extension: &'a str) -> CsvReadOptions<'a> {
        CsvReadOptions::new()
            .has_header(self.options.has_header)
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .schema_infer_max_records(self.options.schema_infer_max_records)
            .file_extension(extension)
    }

    fn read_error(&self, e: DataFusionError) -> CrashError {
        CrashError::data_source_with_source(
            "csv",
            format!("Failed to read {}", self.description()),
            Box::new(e),
        )
    }

    /// File extension the listing filters on. Directories list `.csv` files;
    /// explicit files keep whatever extension they carry.
    fn file_extension(&self) -> String {
        let first = Path::new(&self.paths[0]);
        if first.is_dir() {
            return ".csv".to_string();
        }
        first
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataSource for CsvSource {
    #[instrument(skip(self, ctx), fields(
        table.name = %table_name,
        source.type = "csv",
        source.files = self.paths.len(),
    ))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        info!(
            table.name = %table_name,
            source.paths = ?self.paths,
            csv.delimiter = %self.options.delimiter as char,
            csv.has_header = self.options.has_header,
            "Reading CSV input"
        );

        self.ensure_readable()?;

        let extension = self.file_extension();
        let mut frame = ctx
            .read_csv(self.paths.clone(), self.read_options(&extension))
            .await
            .map_err(|e| self.read_error(e))?;

        if !self.options.infer_types {
            // Only the header names are kept from the first pass.
            let text_fields: Vec<Field> = frame
                .schema()
                .fields()
                .iter()
                .map(|field| Field::new(field.name(), DataType::Utf8, true))
                .collect();
            let text_schema = Schema::new(text_fields);
            frame = ctx
                .read_csv(
                    self.paths.clone(),
                    self.read_options(&extension).schema(&text_schema),
                )
                .await
                .map_err(|e| self.read_error(e))?;
        }
        ctx.register_table(table_name, frame.into_view())?;

        debug!(table.name = %table_name, "CSV input registered");
        Ok(())
    }

    fn description(&self) -> String {
        match self.paths.as_slice() {
            [single] => format!("CSV {single}"),
            many => format!("CSV ({} files)", many.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn charges_file(suffix: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        writeln!(file, "CRASH_ID,CHARGE").unwrap();
        writeln!(file, "1,SPEEDING").unwrap();
        writeln!(file, "2,NO DRIVERS LICENSE").unwrap();
        writeln!(file, "2,SPEEDING").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(CsvSource::new("  ").is_err());
        assert!(CsvSource::from_paths(vec![]).is_err());
    }

    #[test]
    fn test_description() {
        let single = CsvSource::new("Charges_use.csv").unwrap();
        assert_eq!(single.description(), "CSV Charges_use.csv");

        let many = CsvSource::from_paths(vec!["a.csv".into(), "b.csv".into()]).unwrap();
        assert_eq!(many.description(), "CSV (2 files)");
    }

    #[tokio::test]
    async fn test_register_single_file() {
        let file = charges_file(".csv");
        let source = CsvSource::new(file.path().to_str().unwrap()).unwrap();

        let ctx = SessionContext::new();
        source.register(&ctx, "charges").await.unwrap();

        let df = ctx.table("charges").await.unwrap();
        assert_eq!(df.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_register_non_csv_extension() {
        let file = charges_file(".txt");
        let source = CsvSource::new(file.path().to_str().unwrap()).unwrap();

        let ctx = SessionContext::new();
        source.register(&ctx, "charges").await.unwrap();
        assert_eq!(ctx.table("charges").await.unwrap().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_register_glob_location() {
        let dir = TempDir::new().unwrap();
        for part in ["part-0.csv", "part-1.csv"] {
            let mut file = std::fs::File::create(dir.path().join(part)).unwrap();
            writeln!(file, "CRASH_ID,CHARGE").unwrap();
            writeln!(file, "7,SPEEDING").unwrap();
        }

        let pattern = format!("{}/part-*.csv", dir.path().display());
        let source = CsvSource::from_location(&pattern).await.unwrap();
        assert_eq!(source.paths().len(), 2);

        let ctx = SessionContext::new();
        source.register(&ctx, "charges").await.unwrap();
        assert_eq!(ctx.table("charges").await.unwrap().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_register_missing_file() {
        let source = CsvSource::new("/definitely/not/here.csv").unwrap();
        let ctx = SessionContext::new();
        let err = source.register(&ctx, "charges").await.unwrap_err();
        assert!(matches!(err, CrashError::DataSource { .. }));
        assert!(err.to_string().contains("/definitely/not/here.csv"));
        assert!(!ctx.table_exist("charges").unwrap());
    }

    #[tokio::test]
    async fn test_register_directory_without_csv() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "nothing here").unwrap();

        let source = CsvSource::new(dir.path().to_str().unwrap()).unwrap();
        let err = source
            .register(&SessionContext::new(), "units")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No CSV files"));
    }

    fn units_with_late_text(rows: usize) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "CRASH_ID,TOT_INJRY_CNT,DRVR_ZIP").unwrap();
        for id in 0..rows {
            writeln!(file, "{id},1,75001").unwrap();
        }
        writeln!(file, "{rows},NA,7500X").unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_late_non_numeric_values_read_as_text() {
        let file = units_with_late_text(1500);
        let source = CsvSource::new(file.path().to_str().unwrap()).unwrap();

        let ctx = SessionContext::new();
        source.register(&ctx, "units").await.unwrap();

        let df = ctx.table("units").await.unwrap();
        for field in df.schema().fields() {
            assert_eq!(field.data_type(), &DataType::Utf8, "{}", field.name());
        }
        assert_eq!(df.count().await.unwrap(), 1501);
    }

    #[tokio::test]
    async fn test_inferred_types_on_request() {
        let file = charges_file(".csv");
        let options = CsvOptions {
            infer_types: true,
            ..Default::default()
        };
        let source = CsvSource::with_options(file.path().to_str().unwrap(), options).unwrap();

        let ctx = SessionContext::new();
        source.register(&ctx, "charges").await.unwrap();
        let df = ctx.table("charges").await.unwrap();
        assert_eq!(df.schema().field(0).data_type(), &DataType::Int64);
    }
}
