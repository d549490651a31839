//! Engine session management.
//!
//! The analyses never build their own DataFusion session. The driver creates
//! one [`CrashContext`], loads the tables into it, and drops it when the run
//! ends.

mod context;

pub use context::{CrashContext, CrashContextConfig};
