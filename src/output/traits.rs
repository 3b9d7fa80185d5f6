//! Record sink traits and types
//!
//! This module defines the trait interface for record sinks and the
//! run summary shared by the report writers.

use crate::state::{DownloadOutcome, PeriodStats};
use crate::storage::{RunStatus, StorageError};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sink already finalized")]
    Finalized,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for per-repository records
///
/// Sinks are owned by the coordinator and written sequentially, in the order
/// the search API returned the repositories.
pub trait RecordSink: Send {
    /// Records the outcome of one archive fetch
    fn record_outcome(&mut self, outcome: &DownloadOutcome) -> OutputResult<()>;

    /// Records a completed top-level window
    fn record_period(&mut self, _period: &PeriodStats) -> OutputResult<()> {
        Ok(())
    }

    /// Flushes and closes the sink
    ///
    /// # Arguments
    ///
    /// * `status` - The final status of the run
    fn finalize(&mut self, status: RunStatus) -> OutputResult<()>;
}

/// Summary of one harvest run
#[derive(Debug, Clone)]
pub struct RunSummary {
    // Run metadata
    pub run_id: Option<i64>,
    pub topic: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub config_hash: String,

    // One entry per top-level window, chronological
    pub periods: Vec<PeriodStats>,
}

impl RunSummary {
    pub fn total_downloaded(&self) -> u64 {
        self.periods.iter().map(|p| p.downloaded).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.periods.iter().map(|p| p.failed).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.periods.iter().map(|p| p.skipped).sum()
    }

    pub fn total_pages(&self) -> u64 {
        self.periods.iter().map(|p| p.pages_processed).sum()
    }

    pub fn total_unreachable(&self) -> u64 {
        self.periods.iter().map(|p| p.unreachable).sum()
    }

    /// Share of fetched repositories whose archive made it to disk
    pub fn success_rate(&self) -> f64 {
        let fetched = self.total_downloaded() + self.total_failed();
        if fetched == 0 {
            return 0.0;
        }
        (self.total_downloaded() as f64 / fetched as f64) * 100.0
    }
}
