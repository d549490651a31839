//! Runs every crash analysis against the datasets named in the settings file.
//!
//! The settings file is `config.yaml` in the working directory unless
//! `CRASH_ANALYSIS_CONFIG` names another one. Log verbosity follows
//! `RUST_LOG`.

use anyhow::{Context, Result};
use crash_analysis::analysis::{AnalysisRunner, CrashAnalysis};
use crash_analysis::config::Settings;
use crash_analysis::logging::setup::{init_logging, LoggingConfig};
use crash_analysis::prelude::*;
use crash_analysis::schema::CrashTables;
use crash_analysis::sink::FileSink;
use std::sync::Arc;
use tracing::info;

const CONFIG_ENV: &str = "CRASH_ANALYSIS_CONFIG";
const DEFAULT_CONFIG: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default())?;

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let settings = Settings::from_path(&config_path)
        .with_context(|| format!("loading settings from {config_path}"))?;

    let mut ctx = CrashContext::with_config(settings.engine.clone())?;
    let tables = CrashTables::load(&mut ctx, &settings.inputs)
        .await
        .context("loading crash tables")?;

    let engine = CrashAnalysis::new(tables, Arc::new(FileSink::new()));
    let runner = AnalysisRunner::new(engine, &settings)?;
    runner
        .run_all(|analysis, summary| println!("{}: {summary}", analysis.label()))
        .await?;

    info!(tables = ctx.registered_tables().len(), "Releasing session");
    Ok(())
}
