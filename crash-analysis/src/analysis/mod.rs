//! Descriptive statistics over the crash tables.
//!
//! [`CrashAnalysis`] holds the loaded tables and exposes one method per
//! question. [`AnalysisRunner`] calls them in their fixed order, writing each
//! result to its configured destination and reporting a [`Summary`].
//!
//! Two analyses rank rows and differ: vehicle makes use dense
//! rank (ties share a rank, no gaps), ethnicities per body style use ordinary
//! rank (ties share a rank, the next rank skips).

pub mod frames;

mod engine;
mod runner;

pub use engine::{CrashAnalysis, MAKE_RANK_BAND, RANK, TOTAL_CASUALTIES};
pub use frames::COUNT;
pub use runner::{Analysis, AnalysisRunner, Summary};
