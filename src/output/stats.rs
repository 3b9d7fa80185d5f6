//! Statistics generation from the harvest ledger
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::state::{DownloadStatus, PeriodStats};
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;

/// Harvest statistics for the latest run
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Number of runs in the ledger
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Archives downloaded in the latest run
    pub downloaded: u64,

    /// Failed downloads in the latest run
    pub failed: u64,

    /// Periods completed in the latest run
    pub periods: Vec<PeriodStats>,
}

impl HarvestStatistics {
    pub fn skipped(&self) -> u64 {
        self.periods.iter().map(|p| p.skipped).sum()
    }

    pub fn unreachable(&self) -> u64 {
        self.periods.iter().map(|p| p.unreachable).sum()
    }
}

/// Loads statistics of the latest run from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let total_runs = storage.count_runs()?;
    let latest_run = storage.get_latest_run()?;

    let (downloaded, failed, periods) = match &latest_run {
        Some(run) => (
            storage.count_outcomes(run.id, DownloadStatus::Downloaded)?,
            storage.count_outcomes(run.id, DownloadStatus::Failed)?,
            storage.get_periods(run.id)?,
        ),
        None => (0, 0, Vec::new()),
    };

    Ok(HarvestStatistics {
        total_runs,
        latest_run,
        downloaded,
        failed,
        periods,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Runs recorded: {}", stats.total_runs);

    let run = match &stats.latest_run {
        Some(run) => run,
        None => {
            println!("No harvest runs found.");
            return;
        }
    };

    println!();
    println!("Latest run #{} ({})", run.id, run.status.to_db_string());
    println!("  Topic: {}", run.topic);
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Repositories:");
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Failed: {}", stats.failed);
    println!("  Skipped: {}", stats.skipped());
    println!("  Unreachable: {}", stats.unreachable());
    println!();

    if !stats.periods.is_empty() {
        println!("Periods ({}):", stats.periods.len());
        for period in &stats.periods {
            println!(
                "  {}  downloaded={} failed={} pages={} leaves={}",
                period.window, period.downloaded, period.failed, period.pages_processed, period.leaf_windows
            );
        }
        println!();
    }

    let fetched = stats.downloaded + stats.failed;
    let success_rate = if fetched > 0 {
        (stats.downloaded as f64 / fetched as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} archives downloaded)",
        success_rate, stats.downloaded, fetched
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoItem;
    use crate::state::DownloadOutcome;
    use crate::storage::{RunStatus, SqliteStorage};
    use crate::window::DateWindow;
    use chrono::NaiveDate;

    #[test]
    fn test_load_statistics_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_runs, 0);
        assert!(stats.latest_run.is_none());
        assert_eq!(stats.downloaded, 0);
    }

    #[test]
    fn test_load_statistics_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.create_run("old", "shopping").unwrap();
        storage.finish_run(first, RunStatus::Failed).unwrap();
        let run_id = storage.create_run("new", "shopping").unwrap();

        let item = RepoItem {
            owner: "octo".to_string(),
            name: "shop".to_string(),
            full_name: "octo/shop".to_string(),
            clone_url: String::new(),
            default_branch: None,
            topics: None,
        };
        storage
            .insert_outcome(run_id, &DownloadOutcome::failed(item, "main".to_string(), "boom"))
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2021, 3, 3).unwrap();
        let mut period = PeriodStats::new(DateWindow::single_day(day));
        period.failed = 1;
        period.skipped = 4;
        storage.insert_period(run_id, &period).unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.latest_run.as_ref().map(|r| r.id), Some(run_id));
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.downloaded, 0);
        assert_eq!(stats.skipped(), 4);
    }
}
