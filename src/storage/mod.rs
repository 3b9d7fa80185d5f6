//! Storage module for persisting harvest data
//!
//! This module handles the optional SQLite ledger, including:
//! - Database initialization and schema management
//! - Run tracking with the hash of the configuration used
//! - Per-repository outcomes and per-window statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::DownloadStatus;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub topic: String,
    pub status: RunStatus,
}

/// Represents one recorded fetch
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub id: i64,
    pub run_id: i64,
    pub full_name: String,
    pub branch: String,
    pub status: DownloadStatus,
    pub detail: String,
    pub archive_path: Option<String>,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
