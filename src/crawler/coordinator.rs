//! Harvest coordinator - main orchestration logic
//!
//! This module contains the main harvest loop that coordinates all aspects of
//! a run, including:
//! - Walking the top-level windows of the date range
//! - Partitioning each window below the search result cap
//! - Paging through every leaf and fetching eligible archives
//! - Writing records, period statistics and the final summary

use crate::config::{Config, TopicPolicy};
use crate::crawler::fetcher::ArchiveFetcher;
use crate::crawler::is_eligible;
use crate::github::{
    build_http_client, PageWalker, RateLimitedClient, RepoItem, SearchClient, Sleeper,
    TokioSleeper,
};
use crate::output::{
    generate_markdown_summary, write_summary_csv, CsvRecordSink, RecordSink, RunSummary,
    SqliteRecordSink, MAX_LISTED_FAILURES,
};
use crate::state::{DownloadOutcome, PeriodStats};
use crate::storage::{open_storage, OutcomeRecord, RunStatus};
use crate::window::{partition, DateWindow, LeafWindow, TopLevelWindows};
use crate::HarvestError;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

/// Main harvest coordinator structure
///
/// Owns the search client, the fetcher, every record sink and the per-window
/// summary; nothing outlives a run.
pub struct Coordinator {
    config: Config,
    config_hash: String,
    search: SearchClient,
    fetcher: ArchiveFetcher,
    sinks: Vec<Box<dyn RecordSink>>,
    summary: Vec<PeriodStats>,
    failures: Vec<OutcomeRecord>,
    run_id: Option<i64>,
    started_at: String,
}

impl Coordinator {
    /// Creates a coordinator without any record sink
    ///
    /// Use [`add_sink`](Self::add_sink) to attach sinks, or
    /// [`from_config`](Self::from_config) to build the configured ones.
    pub fn new(
        config: Config,
        config_hash: String,
        search: SearchClient,
        fetcher: ArchiveFetcher,
    ) -> Self {
        Self {
            config,
            config_hash,
            search,
            fetcher,
            sinks: Vec::new(),
            summary: Vec::new(),
            failures: Vec::new(),
            run_id: None,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Builds the coordinator, its clients and the configured sinks
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - SHA-256 of the configuration file, recorded in the ledger
    /// * `token` - GitHub token sent with every request
    /// * `sleeper` - Waiting strategy for throttling and page delays
    pub fn from_config(
        config: Config,
        config_hash: String,
        token: &str,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, HarvestError> {
        let http = build_http_client(&config.user_agent, token)?;
        let client = RateLimitedClient::from_config(&config, http.clone(), sleeper.clone())?;
        let search = SearchClient::new(client, &config.search);
        let fetcher = ArchiveFetcher::from_config(&config, http, sleeper)?;

        let records = CsvRecordSink::create(&config.output.records_path)?;
        let ledger = match &config.output.database_path {
            Some(path) => {
                let storage = open_storage(&PathBuf::from(path))?;
                Some(SqliteRecordSink::start(
                    storage,
                    &config_hash,
                    &config.search.topic,
                )?)
            }
            None => None,
        };

        let mut coordinator = Self::new(config, config_hash, search, fetcher);
        coordinator.add_sink(Box::new(records));
        if let Some(ledger) = ledger {
            coordinator.run_id = Some(ledger.run_id());
            coordinator.add_sink(Box::new(ledger));
        }

        Ok(coordinator)
    }

    pub fn add_sink(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    /// Runs the harvest over `start..=finish`
    ///
    /// Consumes the coordinator: the sinks are finalized at the end of the run
    /// and cannot record a second one.
    ///
    /// On success the sinks are finalized and the summary is written. On a
    /// fatal error the same happens for the periods completed so far, the run
    /// is marked failed, and the error is returned.
    pub async fn run(mut self, start: NaiveDate, finish: NaiveDate) -> Result<Vec<PeriodStats>, HarvestError> {
        if start > finish {
            return Err(HarvestError::InvalidWindow { start, end: finish });
        }

        tracing::info!(
            "Starting harvest of topic '{}' from {} to {}",
            self.search.topic(),
            start,
            finish
        );

        match self.harvest(start, finish).await {
            Ok(()) => {
                self.close(RunStatus::Completed)?;
                let downloaded: u64 = self.summary.iter().map(|p| p.downloaded).sum();
                let failed: u64 = self.summary.iter().map(|p| p.failed).sum();
                tracing::info!(
                    "Harvest completed: {} downloaded, {} failed across {} periods",
                    downloaded,
                    failed,
                    self.summary.len()
                );
                Ok(self.summary)
            }
            Err(e) => {
                tracing::error!("Harvest aborted: {}", e);
                if let Err(close_err) = self.close(RunStatus::Failed) {
                    tracing::error!("Failed to write partial results: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn harvest(&mut self, start: NaiveDate, finish: NaiveDate) -> Result<(), HarvestError> {
        let windows = TopLevelWindows::new(start, finish, self.config.window.days);

        for window in windows {
            let stats = self.harvest_window(window).await?;
            tracing::info!(
                "Window {} done: downloaded={} failed={} skipped={} pages={}",
                stats.window,
                stats.downloaded,
                stats.failed,
                stats.skipped,
                stats.pages_processed
            );

            for sink in self.sinks.iter_mut() {
                sink.record_period(&stats)?;
            }
            self.summary.push(stats);
        }

        Ok(())
    }

    async fn harvest_window(&mut self, window: DateWindow) -> Result<PeriodStats, HarvestError> {
        let mut stats = PeriodStats::new(window);

        let leaves = partition(window, &self.search, self.search.cap()).await?;
        tracing::info!("Window {} split into {} leaves", window, leaves.len());

        for leaf in &leaves {
            stats.add_leaf(leaf);
            self.harvest_leaf(leaf, &mut stats).await?;
        }

        Ok(stats)
    }

    async fn harvest_leaf(&mut self, leaf: &LeafWindow, stats: &mut PeriodStats) -> Result<(), HarvestError> {
        if leaf.total_count == 0 {
            tracing::debug!("Leaf {} is empty, nothing to page through", leaf.window);
            return Ok(());
        }

        tracing::info!("Processing {} ({} results)", leaf.window, leaf.total_count);

        let topic = self.search.topic().to_string();
        let policy = self.config.search.topic_policy;
        let concurrency = self.config.archive.concurrency.max(1) as usize;

        let mut walker = PageWalker::new(&self.search, leaf.window);
        while let Some(items) = walker.next_page().await? {
            stats.pages_processed += 1;

            let eligible = select_eligible(items, &topic, policy, stats);
            let outcomes = fetch_in_order(&self.fetcher, eligible, concurrency).await;

            for outcome in outcomes {
                stats.record(&outcome);
                for sink in self.sinks.iter_mut() {
                    sink.record_outcome(&outcome)?;
                }
                if !outcome.status.is_success() && self.failures.len() < MAX_LISTED_FAILURES {
                    self.failures.push(OutcomeRecord {
                        id: 0,
                        run_id: self.run_id.unwrap_or_default(),
                        full_name: outcome.item.full_name.clone(),
                        branch: outcome.branch.clone(),
                        status: outcome.status,
                        detail: outcome.detail.clone(),
                        archive_path: outcome.archive_path.as_ref().map(|p| p.display().to_string()),
                    });
                }
            }
        }

        Ok(())
    }

    /// Finalizes every sink and writes the summary reports
    ///
    /// Every step is attempted even if an earlier one fails; the first error is
    /// returned.
    fn close(&mut self, status: RunStatus) -> Result<(), HarvestError> {
        let mut first_error: Option<HarvestError> = None;

        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.finalize(status) {
                tracing::error!("Failed to finalize record sink: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        let summary_path = PathBuf::from(&self.config.output.summary_path);
        match write_summary_csv(&summary_path, &self.summary) {
            Ok(()) => tracing::info!(
                "Summary of {} periods saved to {}",
                self.summary.len(),
                summary_path.display()
            ),
            Err(e) => {
                tracing::error!("Failed to write summary: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        if let Some(path) = &self.config.output.markdown_path {
            let summary = RunSummary {
                run_id: self.run_id,
                topic: self.config.search.topic.clone(),
                started_at: self.started_at.clone(),
                finished_at: Some(chrono::Utc::now().to_rfc3339()),
                status,
                config_hash: self.config_hash.clone(),
                periods: self.summary.clone(),
            };
            if let Err(e) = generate_markdown_summary(&summary, &self.failures, &PathBuf::from(path)) {
                tracing::error!("Failed to write markdown summary: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Applies the topic policy to one page, counting rejected items as skipped
fn select_eligible(
    items: Vec<RepoItem>,
    topic: &str,
    policy: TopicPolicy,
    stats: &mut PeriodStats,
) -> Vec<RepoItem> {
    items
        .into_iter()
        .filter(|item| {
            let keep = is_eligible(item, topic, policy);
            if !keep {
                tracing::info!(
                    "Skipping {}: topic '{}' not among its topics",
                    item.full_name,
                    topic
                );
                stats.skipped += 1;
            }
            keep
        })
        .collect()
}

/// Fetches the archives of one page, returning outcomes in the input order
async fn fetch_in_order(
    fetcher: &ArchiveFetcher,
    items: Vec<RepoItem>,
    concurrency: usize,
) -> Vec<DownloadOutcome> {
    if concurrency <= 1 {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in &items {
            outcomes.push(fetcher.fetch(item).await);
        }
        return outcomes;
    }

    stream::iter(items.iter())
        .map(|item| fetcher.fetch(item))
        .buffered(concurrency)
        .collect()
        .await
}

/// Runs a complete harvest for the configured date range
///
/// This function orchestrates the entire process:
///
/// 1. Build the HTTP client, search client and archive fetcher
/// 2. Open the records file and, if configured, the SQLite ledger
/// 3. For each top-level window:
///    a. Partition it below the result cap
///    b. Page through every leaf
///    c. Fetch the archive of every eligible repository
///    d. Record one row per repository
/// 4. Write the summary and close the ledger run
///
/// # Example
///
/// ```no_run
/// use topic_harvest::config::{load_config_with_hash, resolve_token};
/// use topic_harvest::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let token = resolve_token(&config.auth.token_env)?;
/// let periods = run_harvest(config, hash, &token).await?;
/// println!("{} periods harvested", periods.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: String,
    token: &str,
) -> Result<Vec<PeriodStats>, HarvestError> {
    let start = config.window.start;
    let finish = config.window.finish;
    let coordinator = Coordinator::from_config(config, config_hash, token, Arc::new(TokioSleeper))?;
    coordinator.run(start, finish).await
}
