//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{DownloadOutcome, DownloadStatus, PeriodStats};
use crate::storage::{OutcomeRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("No harvest runs found in database")]
    NoRuns,

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The ledger keeps one row per run, per fetched repository and per
/// completed top-level window.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, topic: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status of a run and stamps its finish time
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Counts all recorded runs
    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Outcomes =====

    /// Records the outcome of one archive fetch
    fn insert_outcome(&mut self, run_id: i64, outcome: &DownloadOutcome) -> StorageResult<()>;

    /// Counts a run's outcomes with the given status
    fn count_outcomes(&self, run_id: i64, status: DownloadStatus) -> StorageResult<u64>;

    /// Gets a run's failed outcomes in the order they were recorded
    fn get_failed_outcomes(&self, run_id: i64, limit: usize) -> StorageResult<Vec<OutcomeRecord>>;

    // ===== Periods =====

    /// Records the statistics of a completed top-level window
    fn insert_period(&mut self, run_id: i64, period: &PeriodStats) -> StorageResult<()>;

    /// Gets a run's periods in chronological order
    fn get_periods(&self, run_id: i64) -> StorageResult<Vec<PeriodStats>>;
}
