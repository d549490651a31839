//! Settings file for a crash analysis run.
//!
//! The settings are a flat YAML document naming where each input table lives,
//! where each analysis writes its result, and which format it writes:
//!
//! ```yaml
//! INPUT_FILE_NAME:
//!   Charges_use: Data/Charges_use.csv
//!   Damages_use: Data/Damages_use.csv
//!   Endorse_use: Data/Endorse_use.csv
//!   Primary_Person_use: Data/Primary_Person_use.csv
//!   Restrict_use: Data/Restrict_use.csv
//!   Units_use: Data/Units_use.csv
//! OUTPUT_FILE_PATH:
//!   Path1: Output/1
//!   Path2: Output/2
//!   # ... through Path8
//! OUTPUT_FILE_FORMAT:
//!   Format: parquet
//! ENGINE:            # optional
//!   target_partitions: 4
//! ```

use crate::analysis::Analysis;
use crate::prelude::*;
use crate::schema::CrashTable;
use crate::sink::{OutputFormat, OutputTarget};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument};

/// Locations of the six input tables, keyed by `Charges_use`, `Units_use`, ...
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct InputPaths(BTreeMap<String, Option<String>>);

impl InputPaths {
    /// Returns the configured location of `table`.
    pub fn location(&self, table: CrashTable) -> Result<&str> {
        lookup(&self.0, "INPUT_FILE_NAME", table.config_key())
    }

    /// Sets the location of `table`.
    pub fn insert(&mut self, table: CrashTable, location: impl Into<String>) {
        self.0
            .insert(table.config_key().to_string(), Some(location.into()));
    }
}

/// Destination paths of the eight analyses, keyed by `Path1` .. `Path8`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct OutputPaths(BTreeMap<String, Option<String>>);

impl OutputPaths {
    /// Returns the destination configured for `analysis`.
    pub fn path(&self, analysis: Analysis) -> Result<&str> {
        lookup(&self.0, "OUTPUT_FILE_PATH", analysis.output_key())
    }

    /// Sets the destination of `analysis`.
    pub fn insert(&mut self, analysis: Analysis, path: impl Into<String>) {
        self.0
            .insert(analysis.output_key().to_string(), Some(path.into()));
    }
}

fn lookup<'a>(
    entries: &'a BTreeMap<String, Option<String>>,
    section: &str,
    key: &str,
) -> Result<&'a str> {
    match entries.get(key).and_then(|value| value.as_deref()) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CrashError::Configuration(format!(
            "Missing setting {section}.{key}"
        ))),
    }
}

/// The `OUTPUT_FILE_FORMAT` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatSetting {
    #[serde(rename = "Format")]
    pub format: String,
}

impl Default for FormatSetting {
    fn default() -> Self {
        Self {
            format: OutputFormat::Parquet.to_string(),
        }
    }
}

/// A parsed settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(rename = "INPUT_FILE_NAME")]
    pub inputs: InputPaths,
    #[serde(rename = "OUTPUT_FILE_PATH")]
    pub outputs: OutputPaths,
    #[serde(rename = "OUTPUT_FILE_FORMAT")]
    pub output_format: FormatSetting,
    #[serde(rename = "ENGINE", default)]
    pub engine: CrashContextConfig,
}

impl Settings {
    /// Reads and validates the settings file at `path`.
    #[instrument]
    pub fn from_path(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CrashError::Configuration(format!(
                "Cannot read settings file {}: {e}",
                path.display()
            ))
        })?;
        let settings = Self::from_yaml_str(&contents)?;
        debug!(settings.path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Parses and validates settings from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)
            .map_err(|e| CrashError::Configuration(format!("Invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every input, every output and the format are usable.
    pub fn validate(&self) -> Result<()> {
        for table in CrashTable::ALL {
            self.inputs.location(table)?;
        }
        for analysis in Analysis::ALL {
            self.outputs.path(analysis)?;
        }
        self.format()?;
        Ok(())
    }

    /// The serialization format shared by all outputs.
    pub fn format(&self) -> Result<OutputFormat> {
        self.output_format.format.parse()
    }

    /// Where and how `analysis` writes its result.
    pub fn output_target(&self, analysis: Analysis) -> Result<OutputTarget> {
        Ok(OutputTarget::new(
            self.outputs.path(analysis)?,
            self.format()?,
        ))
    }
}
