/// Per-repository download results
use crate::github::RepoItem;
use std::fmt;
use std::path::PathBuf;

/// Final status of one archive fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    /// The archive is on disk
    Downloaded,

    /// The fetch failed; the outcome's detail says why
    Failed,
}

impl DownloadStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "downloaded" => Some(Self::Downloaded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Result of fetching one repository's archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The repository the fetch was for
    pub item: RepoItem,

    /// Whether the archive made it to disk
    pub status: DownloadStatus,

    /// Human-readable detail (error message on failure)
    pub detail: String,

    /// Branch whose archive was requested
    pub branch: String,

    /// Target location of the archive; on failure nothing exists there
    pub archive_path: Option<PathBuf>,
}

impl DownloadOutcome {
    pub fn downloaded(item: RepoItem, branch: String, path: PathBuf, detail: impl Into<String>) -> Self {
        Self {
            item,
            status: DownloadStatus::Downloaded,
            detail: detail.into(),
            branch,
            archive_path: Some(path),
        }
    }

    pub fn failed(item: RepoItem, branch: String, detail: impl Into<String>) -> Self {
        Self {
            item,
            status: DownloadStatus::Failed,
            detail: detail.into(),
            branch,
            archive_path: None,
        }
    }

    /// Sets the target location, typically for a failed fetch
    pub fn with_archive_path(mut self, path: PathBuf) -> Self {
        self.archive_path = Some(path);
        self
    }

    /// Status column of the record sink: `downloaded` or `error: <detail>`
    pub fn status_label(&self) -> String {
        match self.status {
            DownloadStatus::Downloaded => "downloaded".to_string(),
            DownloadStatus::Failed => format!("error: {}", self.detail),
        }
    }

    /// Archive path as text, empty when nothing was written
    pub fn archive_path_display(&self) -> String {
        self.archive_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}
