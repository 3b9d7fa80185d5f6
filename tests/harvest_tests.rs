//! Integration tests for complete harvest runs
//!
//! These tests drive the coordinator end-to-end against a wiremock server
//! standing in for both the search API and the archive endpoint.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use topic_harvest::config::load_config_with_hash;
use topic_harvest::crawler::Coordinator;
use topic_harvest::github::{ApiError, RecordingSleeper};
use topic_harvest::state::{DownloadStatus, PeriodStats};
use topic_harvest::storage::{open_storage, RunStatus, Storage};
use topic_harvest::HarvestError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    dir: TempDir,
    server: MockServer,
    sleeper: RecordingSleeper,
}

impl Harness {
    async fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            server: MockServer::start().await,
            sleeper: RecordingSleeper::new(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes a configuration file pointing every endpoint at the mock server
    fn coordinator(&self, start: &str, finish: &str, extra_search: &str, concurrency: u32) -> Coordinator {
        let content = format!(
            r#"
[search]
topic = "shopping"
api-base-url = "{uri}"
page-delay-ms = 10000
{extra_search}

[window]
start = "{start}"
finish = "{finish}"

[archive]
output-dir = "{archives}"
base-url = "{uri}"
concurrency = {concurrency}

[output]
records-path = "{records}"
summary-path = "{summary}"
markdown-path = "{markdown}"
database-path = "{database}"

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
"#,
            uri = self.server.uri(),
            extra_search = extra_search,
            start = start,
            finish = finish,
            archives = self.path("archives").display(),
            concurrency = concurrency,
            records = self.path("report/repositories.csv").display(),
            summary = self.path("report/summary.csv").display(),
            markdown = self.path("report/summary.md").display(),
            database = self.path("harvest.db").display(),
        );
        let config_path = self.path("harvest.toml");
        std::fs::write(&config_path, content).unwrap();

        let (config, hash) = load_config_with_hash(&config_path).expect("Config should load");
        Coordinator::from_config(config, hash, "test-token", Arc::new(self.sleeper.clone()))
            .expect("Coordinator should build")
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).unwrap()
    }
}

fn date(s: &str) -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn repo(name: &str, branch: Option<&str>, topics: Option<Vec<&str>>) -> Value {
    let mut item = json!({
        "name": name,
        "full_name": format!("octo/{}", name),
        "owner": { "login": "octo" },
        "clone_url": format!("https://github.com/octo/{}.git", name),
    });
    if let Some(branch) = branch {
        item["default_branch"] = json!(branch);
    }
    if let Some(topics) = topics {
        item["topics"] = json!(topics);
    }
    item
}

async fn mount_search(server: &MockServer, q: &str, per_page: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", q))
        .and(query_param("per_page", per_page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .with_priority(1)
        .mount(server)
        .await;
}

async fn mount_archive(server: &MockServer, route: &str, template: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .expect(expected)
        .mount(server)
        .await;
}

const JANUARY: &str = "topic:shopping created:2020-01-01..2020-01-10";

async fn mount_january(harness: &Harness) {
    let items = vec![
        repo("alpha", Some("main"), Some(vec!["shopping", "web"])),
        repo("beta", Some("dev"), None),
        repo("gamma", Some("main"), Some(vec!["web"])),
    ];
    mount_search(&harness.server, JANUARY, "1", json!({ "total_count": 3, "items": [] })).await;
    mount_search(
        &harness.server,
        JANUARY,
        "100",
        json!({ "total_count": 3, "items": items }),
    )
    .await;
}

#[tokio::test]
async fn test_full_harvest_single_window() {
    let harness = Harness::new().await;
    mount_january(&harness).await;
    mount_archive(
        &harness.server,
        "/repos/octo/alpha/zipball/main",
        ResponseTemplate::new(200).set_body_bytes(b"PK-alpha".to_vec()),
        1,
    )
    .await;
    mount_archive(&harness.server, "/repos/octo/beta/zipball/dev", ResponseTemplate::new(404), 1).await;
    mount_archive(
        &harness.server,
        "/repos/octo/gamma/zipball/main",
        ResponseTemplate::new(200),
        0,
    )
    .await;

    let coordinator = harness.coordinator("2020-01-01", "2020-01-10", "", 1);
    let periods = coordinator
        .run(date("2020-01-01"), date("2020-01-10"))
        .await
        .expect("Harvest should succeed");

    assert_eq!(periods.len(), 1);
    let period: &PeriodStats = &periods[0];
    assert_eq!(period.window.to_string(), "2020-01-01..2020-01-10");
    assert_eq!(period.downloaded, 1);
    assert_eq!(period.failed, 1);
    assert_eq!(period.skipped, 1);
    assert_eq!(period.pages_processed, 1);
    assert_eq!(period.leaf_windows, 1);
    assert_eq!(period.unreachable, 0);

    // One record per fetched item, in API order
    let records = harness.read("report/repositories.csv");
    let lines: Vec<&str> = records.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Username,Repository Name,Full Name"));
    assert!(lines[1].starts_with("octo,alpha,octo/alpha,https://github.com/octo/alpha.git,main,shopping;web,downloaded,"));
    assert!(lines[1].ends_with("octo#alpha@main.zip"));
    assert_eq!(
        lines[2],
        format!(
            "octo,beta,octo/beta,https://github.com/octo/beta.git,dev,,error: HTTP 404 Not Found,{}",
            harness.path("archives").join("octo#beta@dev.zip").display()
        )
    );

    let archive = harness.path("archives").join("octo#alpha@main.zip");
    assert_eq!(std::fs::read(archive).unwrap(), b"PK-alpha");

    let summary = harness.read("report/summary.csv");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "2020-01-01,2020-01-10,1,1,1,1,0");

    let markdown = harness.read("report/summary.md");
    assert!(markdown.contains("- **Status**: completed"));
    assert!(markdown.contains("| octo/beta | dev | HTTP 404 Not Found |"));

    let storage = open_storage(&harness.path("harvest.db")).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.topic, "shopping");
    assert_eq!(storage.count_outcomes(run.id, DownloadStatus::Downloaded).unwrap(), 1);
    assert_eq!(storage.count_outcomes(run.id, DownloadStatus::Failed).unwrap(), 1);
    assert_eq!(storage.get_periods(run.id).unwrap(), periods);

    // A single page means no inter-page delay
    assert!(harness.sleeper.waits().is_empty());
}

#[tokio::test]
async fn test_each_run_reports_only_its_own_periods() {
    let harness = Harness::new().await;
    mount_january(&harness).await;
    mount_archive(
        &harness.server,
        "/repos/octo/alpha/zipball/main",
        ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()),
        1,
    )
    .await;
    mount_archive(&harness.server, "/repos/octo/beta/zipball/dev", ResponseTemplate::new(404), 2).await;

    let first = harness
        .coordinator("2020-01-01", "2020-01-10", "", 1)
        .run(date("2020-01-01"), date("2020-01-10"))
        .await
        .expect("First harvest should succeed");
    let second = harness
        .coordinator("2020-01-01", "2020-01-10", "", 1)
        .run(date("2020-01-01"), date("2020-01-10"))
        .await
        .expect("Second harvest should succeed");

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].downloaded, 1);
    assert_eq!(second[0].failed, 1);

    let summary = harness.read("report/summary.csv");
    assert_eq!(summary.lines().count(), 2);

    let storage = open_storage(&harness.path("harvest.db")).unwrap();
    assert_eq!(storage.count_runs().unwrap(), 2);
    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(storage.get_periods(latest.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_require_topic_skips_items_without_topic_data() {
    let harness = Harness::new().await;
    mount_january(&harness).await;
    mount_archive(
        &harness.server,
        "/repos/octo/alpha/zipball/main",
        ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()),
        1,
    )
    .await;
    mount_archive(&harness.server, "/repos/octo/beta/zipball/dev", ResponseTemplate::new(200), 0).await;

    let coordinator =
        harness.coordinator("2020-01-01", "2020-01-10", r#"topic-policy = "require-topic""#, 1);
    let periods = coordinator
        .run(date("2020-01-01"), date("2020-01-10"))
        .await
        .expect("Harvest should succeed");

    assert_eq!(periods[0].downloaded, 1);
    assert_eq!(periods[0].failed, 0);
    assert_eq!(periods[0].skipped, 2);

    let records = harness.read("report/repositories.csv");
    assert_eq!(records.lines().count(), 2);
}

#[tokio::test]
async fn test_concurrent_downloads_keep_api_order() {
    let harness = Harness::new().await;
    let q = "topic:shopping created:2020-05-01..2020-05-01";
    let names = ["one", "two", "three", "four", "five"];
    let items: Vec<Value> = names
        .iter()
        .map(|name| repo(name, Some("main"), Some(vec!["shopping"])))
        .collect();

    mount_search(&harness.server, q, "1", json!({ "total_count": 5, "items": [] })).await;
    mount_search(&harness.server, q, "100", json!({ "total_count": 5, "items": items })).await;

    // Earlier repositories answer slower than later ones
    for (i, name) in names.iter().enumerate() {
        let delay = Duration::from_millis(50 * (names.len() - i) as u64);
        mount_archive(
            &harness.server,
            &format!("/repos/octo/{}/zipball/main", name),
            ResponseTemplate::new(200)
                .set_body_bytes(name.as_bytes().to_vec())
                .set_delay(delay),
            1,
        )
        .await;
    }

    let coordinator = harness.coordinator("2020-05-01", "2020-05-01", "", 3);
    let periods = coordinator
        .run(date("2020-05-01"), date("2020-05-01"))
        .await
        .expect("Harvest should succeed");
    assert_eq!(periods[0].downloaded, 5);

    let records = harness.read("report/repositories.csv");
    let recorded: Vec<String> = records
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(recorded, names.to_vec());
}

async fn mount_page(server: &MockServer, q: &str, page: &str, total: u64, items: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", q))
        .and(query_param("per_page", "2"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total_count": total, "items": items })))
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_window_split_into_leaves_sums_into_one_period() {
    let harness = Harness::new().await;
    let query = |range: &str| format!("topic:shopping created:{}", range);
    let shop = || Some(vec!["shopping"]);

    // A cap of 4 with pages of 2: the window splits into an oversized first
    // day and a two-day remainder
    mount_search(&harness.server, &query("2020-01-01..2020-01-03"), "1", json!({ "total_count": 9, "items": [] })).await;
    mount_search(&harness.server, &query("2020-01-01..2020-01-01"), "1", json!({ "total_count": 6, "items": [] })).await;
    mount_search(&harness.server, &query("2020-01-02..2020-01-03"), "1", json!({ "total_count": 3, "items": [] })).await;

    let first_day = query("2020-01-01..2020-01-01");
    mount_page(&harness.server, &first_day, "1", 6, vec![
        repo("d1", Some("main"), shop()),
        repo("d2", Some("main"), Some(vec!["web"])),
    ])
    .await;
    mount_page(&harness.server, &first_day, "2", 6, vec![
        repo("d3", Some("main"), shop()),
        repo("d4", Some("main"), shop()),
    ])
    .await;

    let remainder = query("2020-01-02..2020-01-03");
    mount_page(&harness.server, &remainder, "1", 3, vec![
        repo("r1", Some("main"), shop()),
        repo("r2", Some("main"), None),
    ])
    .await;
    mount_page(&harness.server, &remainder, "2", 3, vec![repo("r3", Some("main"), shop())]).await;

    for name in ["d1", "d3", "d4", "r1", "r2"] {
        mount_archive(
            &harness.server,
            &format!("/repos/octo/{}/zipball/main", name),
            ResponseTemplate::new(200).set_body_bytes(name.as_bytes().to_vec()),
            1,
        )
        .await;
    }
    mount_archive(&harness.server, "/repos/octo/r3/zipball/main", ResponseTemplate::new(404), 1).await;
    mount_archive(&harness.server, "/repos/octo/d2/zipball/main", ResponseTemplate::new(200), 0).await;

    let coordinator = harness.coordinator(
        "2020-01-01",
        "2020-01-03",
        "per-page = 2\nmax-results = 4",
        1,
    );
    let periods = coordinator
        .run(date("2020-01-01"), date("2020-01-03"))
        .await
        .expect("Harvest should succeed");

    assert_eq!(periods.len(), 1);
    let period = &periods[0];
    assert_eq!(period.window.to_string(), "2020-01-01..2020-01-03");
    assert_eq!(period.leaf_windows, 2);
    assert_eq!(period.pages_processed, 4);
    assert_eq!(period.downloaded, 5);
    assert_eq!(period.failed, 1);
    assert_eq!(period.skipped, 1);
    assert_eq!(period.unreachable, 2);

    // Leaves are walked in date order, pages in ascending order
    let records = harness.read("report/repositories.csv");
    let recorded: Vec<&str> = records
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(1).unwrap())
        .collect();
    assert_eq!(recorded, vec!["d1", "d3", "d4", "r1", "r2", "r3"]);

    let summary = harness.read("report/summary.csv");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "2020-01-01,2020-01-03,5,4,1,1,2");

    // One page delay inside each two-page leaf, none for count probes
    assert_eq!(
        harness.sleeper.waits(),
        vec![Duration::from_secs(10), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn test_fatal_error_keeps_partial_summary() {
    let harness = Harness::new().await;

    // The first half-year is empty; every later query is rejected
    mount_search(
        &harness.server,
        "topic:shopping created:2020-01-01..2020-06-30",
        "1",
        json!({ "total_count": 0, "items": [] }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })))
        .with_priority(10)
        .mount(&harness.server)
        .await;

    let coordinator = harness.coordinator("2020-01-01", "2021-01-30", "", 1);
    let result = coordinator.run(date("2020-01-01"), date("2021-01-30")).await;

    assert!(matches!(result, Err(HarvestError::Api(ApiError::Unauthorized))));

    let summary = harness.read("report/summary.csv");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "2020-01-01,2020-06-30,0,0,0,0,0");

    let records = harness.read("report/repositories.csv");
    assert_eq!(records.lines().count(), 1);

    let storage = open_storage(&harness.path("harvest.db")).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.finished_at.is_some());

    let markdown = harness.read("report/summary.md");
    assert!(markdown.contains("- **Status**: failed"));
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let harness = Harness::new().await;
    let coordinator = harness.coordinator("2020-01-01", "2020-01-10", "", 1);

    let result = coordinator.run(date("2020-02-01"), date("2020-01-01")).await;

    assert!(matches!(result, Err(HarvestError::InvalidWindow { .. })));
    assert!(harness.server.received_requests().await.unwrap().is_empty());
}

