/// Per-window harvest statistics
use crate::state::{DownloadOutcome, DownloadStatus};
use crate::window::{DateWindow, LeafWindow};

/// Counters for one top-level window, summed over its leaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodStats {
    /// The top-level window
    pub window: DateWindow,

    /// Archives written to disk
    pub downloaded: u64,

    /// Fetches that failed
    pub failed: u64,

    /// Items rejected by the topic policy (no record written)
    pub skipped: u64,

    /// Search pages requested across all leaves
    pub pages_processed: u64,

    /// Number of leaves the window was partitioned into
    pub leaf_windows: u64,

    /// Results beyond the cap in irreducible single-day leaves
    pub unreachable: u64,
}

impl PeriodStats {
    pub fn new(window: DateWindow) -> Self {
        Self {
            window,
            downloaded: 0,
            failed: 0,
            skipped: 0,
            pages_processed: 0,
            leaf_windows: 0,
            unreachable: 0,
        }
    }

    /// Counts one fetched item
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome.status {
            DownloadStatus::Downloaded => self.downloaded += 1,
            DownloadStatus::Failed => self.failed += 1,
        }
    }

    /// Accounts for one partition leaf
    pub fn add_leaf(&mut self, leaf: &LeafWindow) {
        self.leaf_windows += 1;
        self.unreachable += leaf.unreachable;
    }

    /// Items that produced a record
    pub fn processed(&self) -> u64 {
        self.downloaded + self.failed
    }

    /// Items the search yielded, including skipped ones
    pub fn yielded(&self) -> u64 {
        self.processed() + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoItem;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 30).unwrap(),
        )
        .unwrap()
    }

    fn item() -> RepoItem {
        RepoItem {
            owner: "octo".to_string(),
            name: "shop".to_string(),
            full_name: "octo/shop".to_string(),
            clone_url: String::new(),
            default_branch: None,
            topics: None,
        }
    }

    #[test]
    fn test_record_increments_exactly_one_counter() {
        let mut stats = PeriodStats::new(window());

        stats.record(&DownloadOutcome::downloaded(
            item(),
            "main".to_string(),
            PathBuf::from("a.zip"),
            "downloaded",
        ));
        stats.record(&DownloadOutcome::failed(item(), "main".to_string(), "boom"));
        stats.record(&DownloadOutcome::failed(item(), "main".to_string(), "boom"));
        stats.skipped += 1;

        assert_eq!(stats.downloaded, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.processed(), 3);
        assert_eq!(stats.yielded(), 4);
    }

    #[test]
    fn test_add_leaf_sums_unreachable() {
        let mut stats = PeriodStats::new(window());
        let day = DateWindow::single_day(NaiveDate::from_ymd_opt(2020, 2, 2).unwrap());

        stats.add_leaf(&LeafWindow {
            window: day,
            total_count: 1200,
            unreachable: 200,
        });
        stats.add_leaf(&LeafWindow {
            window: day,
            total_count: 10,
            unreachable: 0,
        });

        assert_eq!(stats.leaf_windows, 2);
        assert_eq!(stats.unreachable, 200);
    }
}
