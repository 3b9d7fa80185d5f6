//! Output module for harvest records and summaries
//!
//! This module handles:
//! - Writing one record per fetched repository (CSV, optionally SQLite)
//! - Writing the per-window run summary (CSV, optionally markdown)
//! - Reading run statistics back from the ledger

mod csv_output;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::{write_summary_csv, CsvRecordSink, RECORD_HEADER, SUMMARY_HEADER};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sqlite_output::SqliteRecordSink;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{OutputError, OutputResult, RecordSink, RunSummary};

use crate::storage::{Storage, StorageError};
use crate::HarvestError;
use std::path::Path;

/// Failed downloads listed in the markdown summary
pub const MAX_LISTED_FAILURES: usize = 50;

/// Builds the summary of the latest run recorded in storage
pub fn generate_summary(storage: &dyn Storage) -> Result<RunSummary, HarvestError> {
    let run = storage
        .get_latest_run()?
        .ok_or(StorageError::NoRuns)?;

    let periods = storage.get_periods(run.id)?;

    Ok(RunSummary {
        run_id: Some(run.id),
        topic: run.topic,
        started_at: run.started_at,
        finished_at: run.finished_at,
        status: run.status,
        config_hash: run.config_hash,
        periods,
    })
}

/// Rewrites the markdown summary of the latest run from storage
pub fn export_summary(storage: &dyn Storage, path: &Path) -> Result<RunSummary, HarvestError> {
    let summary = generate_summary(storage)?;
    let failures = match summary.run_id {
        Some(run_id) => storage.get_failed_outcomes(run_id, MAX_LISTED_FAILURES)?,
        None => Vec::new(),
    };
    generate_markdown_summary(&summary, &failures, path)?;
    Ok(summary)
}
