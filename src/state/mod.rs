//! Harvest state tracking module
//!
//! This module defines the per-item download outcome and the per-window
//! statistics accumulated during a run.

mod outcome;
mod period;

pub use outcome::{DownloadOutcome, DownloadStatus};
pub use period::PeriodStats;
