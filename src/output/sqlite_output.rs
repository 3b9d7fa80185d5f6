//! SQLite-based record sink implementation
//!
//! This module provides a record sink that writes outcomes and periods
//! directly to the SQLite ledger.

use crate::output::traits::{OutputResult, RecordSink};
use crate::state::{DownloadOutcome, PeriodStats};
use crate::storage::{RunStatus, SqliteStorage, Storage};

/// SQLite-based record sink
///
/// The sink owns the storage connection and the run it writes to; the run row
/// is created when the sink is opened and closed by [`RecordSink::finalize`].
pub struct SqliteRecordSink {
    storage: SqliteStorage,
    run_id: i64,
    finished: bool,
}

impl SqliteRecordSink {
    /// Starts a new run in the ledger
    pub fn start(mut storage: SqliteStorage, config_hash: &str, topic: &str) -> OutputResult<Self> {
        let run_id = storage.create_run(config_hash, topic)?;
        tracing::info!("Recording run {} in the ledger", run_id);
        Ok(Self {
            storage,
            run_id,
            finished: false,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }
}

impl RecordSink for SqliteRecordSink {
    fn record_outcome(&mut self, outcome: &DownloadOutcome) -> OutputResult<()> {
        self.storage.insert_outcome(self.run_id, outcome)?;
        Ok(())
    }

    fn record_period(&mut self, period: &PeriodStats) -> OutputResult<()> {
        self.storage.insert_period(self.run_id, period)?;
        Ok(())
    }

    fn finalize(&mut self, status: RunStatus) -> OutputResult<()> {
        if !self.finished {
            self.storage.finish_run(self.run_id, status)?;
            self.finished = true;
        }
        Ok(())
    }
}
