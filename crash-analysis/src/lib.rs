//! # Crash Analysis - descriptive statistics over traffic crash data
//!
//! This crate answers a fixed set of questions about a traffic crash dataset
//! split across six tables (charges, damages, endorsements, primary persons,
//! restrictions and vehicle units), all keyed by `CRASH_ID`. It runs on
//! [DataFusion](https://docs.rs/datafusion): every question is a short
//! filter/join/aggregate/rank pipeline over the loaded tables.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crash_analysis::analysis::{AnalysisRunner, CrashAnalysis};
//! use crash_analysis::config::Settings;
//! use crash_analysis::prelude::*;
//! use crash_analysis::schema::CrashTables;
//! use crash_analysis::sink::FileSink;
//! use std::sync::Arc;
//!
//! # async fn example() -> crash_analysis::error::Result<()> {
//! let settings = Settings::from_path("config.yaml")?;
//! let mut ctx = CrashContext::with_config(settings.engine.clone())?;
//!
//! let tables = CrashTables::load(&mut ctx, &settings.inputs).await?;
//! let engine = CrashAnalysis::new(tables, Arc::new(FileSink::new()));
//!
//! AnalysisRunner::new(engine, &settings)?
//!     .run_all(|analysis, summary| println!("{}: {summary}", analysis.label()))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`config`**: YAML settings naming inputs, outputs and output format
//! - **`core`**: the DataFusion session every table is registered with
//! - **`sources`**: CSV loading (single files, directories, glob patterns)
//! - **`schema`**: typed table schemas checked at load time
//! - **`analysis`**: the eight queries and the runner that orders them
//! - **`sink`**: result writers (Parquet, CSV, JSON) with overwrite semantics
//! - **`logging`**: `tracing` subscriber setup

pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod schema;
pub mod sink;
pub mod sources;
