//! CSV record sink and summary writer

use crate::output::traits::{OutputError, OutputResult, RecordSink};
use crate::state::{DownloadOutcome, PeriodStats};
use crate::storage::RunStatus;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Header of the per-repository records file
pub const RECORD_HEADER: [&str; 8] = [
    "Username",
    "Repository Name",
    "Full Name",
    "Clone URL",
    "Branch",
    "Topics",
    "Download Status",
    "Archive Path",
];

/// Header of the per-window summary file
pub const SUMMARY_HEADER: [&str; 7] = [
    "Start Date",
    "End Date",
    "Downloaded Repositories",
    "Number of Pages",
    "Number of Failed Downloads",
    "Skipped Repositories",
    "Unreachable Results",
];

fn create_file(path: &Path) -> OutputResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

/// Writes one CSV row per fetched repository
///
/// The header is written when the sink is opened, and every row is flushed as
/// it is written so an aborted run leaves a readable file behind.
pub struct CsvRecordSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

impl CsvRecordSink {
    /// Creates (truncating) the records file and writes its header
    pub fn create(path: impl Into<PathBuf>) -> OutputResult<Self> {
        let path = path.into();
        let mut writer = csv::Writer::from_writer(create_file(&path)?);
        writer.write_record(RECORD_HEADER)?;
        writer.flush()?;

        Ok(Self {
            path,
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far, excluding the header
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl RecordSink for CsvRecordSink {
    fn record_outcome(&mut self, outcome: &DownloadOutcome) -> OutputResult<()> {
        let writer = self.writer.as_mut().ok_or(OutputError::Finalized)?;
        let item = &outcome.item;
        writer.write_record([
            item.owner.as_str(),
            item.name.as_str(),
            item.full_name.as_str(),
            item.clone_url.as_str(),
            outcome.branch.as_str(),
            item.topics_joined().as_str(),
            outcome.status_label().as_str(),
            outcome.archive_path_display().as_str(),
        ])?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn finalize(&mut self, status: RunStatus) -> OutputResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!(
                "Wrote {} records to {} (run {})",
                self.rows,
                self.path.display(),
                status.to_db_string()
            );
        }
        Ok(())
    }
}

/// Writes the per-window summary, one row per top-level window
pub fn write_summary_csv(path: &Path, periods: &[PeriodStats]) -> OutputResult<()> {
    let mut writer = csv::Writer::from_writer(create_file(path)?);
    writer.write_record(SUMMARY_HEADER)?;

    for period in periods {
        writer.write_record([
            period.window.start().to_string(),
            period.window.end().to_string(),
            period.downloaded.to_string(),
            period.pages_processed.to_string(),
            period.failed.to_string(),
            period.skipped.to_string(),
            period.unreachable.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoItem;
    use crate::window::DateWindow;
    use chrono::NaiveDate;

    fn item() -> RepoItem {
        RepoItem {
            owner: "octo".to_string(),
            name: "shop".to_string(),
            full_name: "octo/shop".to_string(),
            clone_url: "https://github.com/octo/shop.git".to_string(),
            default_branch: Some("main".to_string()),
            topics: Some(vec!["shopping".to_string(), "web".to_string()]),
        }
    }

    #[test]
    fn test_records_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.csv");

        let mut sink = CsvRecordSink::create(&path).unwrap();
        sink.record_outcome(&DownloadOutcome::downloaded(
            item(),
            "main".to_string(),
            PathBuf::from("out/octo#shop@main.zip"),
            "downloaded",
        ))
        .unwrap();
        sink.record_outcome(&DownloadOutcome::failed(
            item(),
            "main".to_string(),
            "HTTP 404 Not Found",
        ))
        .unwrap();
        sink.finalize(RunStatus::Completed).unwrap();
        assert_eq!(sink.rows(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "Username,Repository Name,Full Name,Clone URL,Branch,Topics,Download Status,Archive Path"
        );
        assert_eq!(
            lines[1],
            "octo,shop,octo/shop,https://github.com/octo/shop.git,main,shopping;web,downloaded,out/octo#shop@main.zip"
        );
        assert_eq!(
            lines[2],
            "octo,shop,octo/shop,https://github.com/octo/shop.git,main,shopping;web,error: HTTP 404 Not Found,"
        );
    }

    #[test]
    fn test_record_after_finalize_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvRecordSink::create(dir.path().join("records.csv")).unwrap();
        sink.finalize(RunStatus::Completed).unwrap();

        let result = sink.record_outcome(&DownloadOutcome::failed(item(), "main".to_string(), "x"));
        assert!(matches!(result, Err(OutputError::Finalized)));
    }

    #[test]
    fn test_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 30).unwrap(),
        )
        .unwrap();
        let mut period = PeriodStats::new(window);
        period.downloaded = 12;
        period.pages_processed = 3;
        period.failed = 1;
        period.skipped = 2;
        period.unreachable = 40;

        write_summary_csv(&path, &[period]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Start Date,End Date,Downloaded Repositories,Number of Pages,Number of Failed Downloads,Skipped Repositories,Unreachable Results"
        );
        assert_eq!(lines[1], "2020-01-01,2020-06-30,12,3,1,2,40");
    }
}
