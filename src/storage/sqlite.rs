//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{DownloadOutcome, DownloadStatus, PeriodStats};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{OutcomeRecord, RunRecord, RunStatus};
use crate::window::DateWindow;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`, creating parent directories
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        topic: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
    })
}

fn parse_date(value: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StorageError::Corrupt(format!("bad date '{}': {}", value, e)))
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, topic: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, topic, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, topic, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, topic, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, topic, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Outcomes =====

    fn insert_outcome(&mut self, run_id: i64, outcome: &DownloadOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let archive_path = outcome
            .archive_path
            .as_ref()
            .map(|p| p.display().to_string());
        self.conn.execute(
            "INSERT INTO outcomes (run_id, owner, name, full_name, clone_url, branch, topics,
             status, detail, archive_path, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run_id,
                outcome.item.owner,
                outcome.item.name,
                outcome.item.full_name,
                outcome.item.clone_url,
                outcome.branch,
                outcome.item.topics_joined(),
                outcome.status.to_db_string(),
                outcome.detail,
                archive_path,
                now
            ],
        )?;
        Ok(())
    }

    fn count_outcomes(&self, run_id: i64, status: DownloadStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM outcomes WHERE run_id = ?1 AND status = ?2",
            params![run_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_failed_outcomes(&self, run_id: i64, limit: usize) -> StorageResult<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, full_name, branch, detail, archive_path FROM outcomes
             WHERE run_id = ?1 AND status = ?2 ORDER BY id LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![
                run_id,
                DownloadStatus::Failed.to_db_string(),
                i64::try_from(limit).unwrap_or(i64::MAX)
            ],
            |row| {
                Ok(OutcomeRecord {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    full_name: row.get(2)?,
                    branch: row.get(3)?,
                    status: DownloadStatus::Failed,
                    detail: row.get(4)?,
                    archive_path: row.get(5)?,
                })
            },
        )?;

        let mut outcomes = Vec::new();
        for row in rows {
            outcomes.push(row?);
        }
        Ok(outcomes)
    }

    // ===== Periods =====

    fn insert_period(&mut self, run_id: i64, period: &PeriodStats) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO periods (run_id, start_date, end_date, downloaded, failed, skipped,
             pages, leaf_windows, unreachable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                period.window.start().format(DATE_FORMAT).to_string(),
                period.window.end().format(DATE_FORMAT).to_string(),
                period.downloaded as i64,
                period.failed as i64,
                period.skipped as i64,
                period.pages_processed as i64,
                period.leaf_windows as i64,
                period.unreachable as i64
            ],
        )?;
        Ok(())
    }

    fn get_periods(&self, run_id: i64) -> StorageResult<Vec<PeriodStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT start_date, end_date, downloaded, failed, skipped, pages, leaf_windows,
             unreachable FROM periods WHERE run_id = ?1 ORDER BY start_date",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                [
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ],
            ))
        })?;

        let mut periods = Vec::new();
        for row in rows {
            let (start, end, counts) = row?;
            let window = DateWindow::new(parse_date(&start)?, parse_date(&end)?)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?;
            let [downloaded, failed, skipped, pages, leaves, unreachable] =
                counts.map(|c| c.max(0) as u64);

            let mut period = PeriodStats::new(window);
            period.downloaded = downloaded;
            period.failed = failed;
            period.skipped = skipped;
            period.pages_processed = pages;
            period.leaf_windows = leaves;
            period.unreachable = unreachable;
            periods.push(period);
        }

        Ok(periods)
    }
}
