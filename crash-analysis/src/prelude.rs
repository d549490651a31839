//! Prelude for commonly used types and traits in crash-analysis.

pub use crate::core::{CrashContext, CrashContextConfig};
pub use crate::error::{CrashError, Result};
pub use crate::logging::setup::LoggingConfig;
