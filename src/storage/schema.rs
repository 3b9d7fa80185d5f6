//! Database schema definitions
//!
//! This module contains the SQL schema of the harvest ledger.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    topic TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per fetched repository
CREATE TABLE IF NOT EXISTS outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    clone_url TEXT NOT NULL,
    branch TEXT NOT NULL,
    topics TEXT NOT NULL,
    status TEXT NOT NULL,
    detail TEXT NOT NULL,
    archive_path TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcomes_run ON outcomes(run_id);
CREATE INDEX IF NOT EXISTS idx_outcomes_status ON outcomes(status);

-- One row per completed top-level window
CREATE TABLE IF NOT EXISTS periods (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    downloaded INTEGER NOT NULL,
    failed INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    pages INTEGER NOT NULL,
    leaf_windows INTEGER NOT NULL,
    unreachable INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_periods_run ON periods(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
