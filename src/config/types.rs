use chrono::NaiveDate;
use serde::Deserialize;

/// Main configuration structure for Topic-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub window: WindowConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    pub archive: ArchiveConfig,
    pub output: OutputConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Search predicate and paging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Topic every harvested repository must carry (e.g. "microservices")
    pub topic: String,

    /// Base URL of the GitHub REST API
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Results requested per search page (the API allows at most 100)
    #[serde(rename = "per-page", default = "default_per_page")]
    pub per_page: u32,

    /// Maximum number of results a single search query can reach
    #[serde(rename = "max-results", default = "default_max_results")]
    pub max_results: u64,

    /// Delay before every search page after the first (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// What to do with items whose topic data is missing
    #[serde(rename = "topic-policy", default)]
    pub topic_policy: TopicPolicy,
}

/// Acceptance policy for search items whose declared topics don't prove the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicPolicy {
    /// Items without topic data are accepted on the strength of the query filter
    #[default]
    TrustQuery,

    /// Items must declare the topic themselves
    RequireTopic,
}

/// Creation-date range to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// First creation date included in the harvest
    pub start: NaiveDate,

    /// Last creation date included in the harvest
    pub finish: NaiveDate,

    /// Length of each top-level window in days
    #[serde(default = "default_window_days")]
    pub days: u32,
}

/// Throttling and retry behavior of the API client
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Seconds added on top of the advertised quota reset time
    #[serde(rename = "reset-margin-secs", default = "default_reset_margin_secs")]
    pub reset_margin_secs: u64,

    /// Attempts allowed for throttled (429) and server (5xx) failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor applied to the delay after every retry
    #[serde(rename = "backoff-multiplier", default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Timeout for a single search request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reset_margin_secs: default_reset_margin_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Archive download configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Directory receiving the downloaded archives
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Base URL archives are fetched from (`<base>/repos/<owner>/<name>/zipball/<branch>`)
    #[serde(rename = "base-url", default = "default_api_base_url")]
    pub base_url: String,

    /// Branch used when the search result doesn't report one
    #[serde(rename = "default-branch", default = "default_branch")]
    pub default_branch: String,

    /// Skip repositories whose archive already exists on disk
    #[serde(rename = "skip-existing", default = "default_true")]
    pub skip_existing: bool,

    /// Archives downloaded concurrently within one result page
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Timeout for a single archive download (seconds)
    #[serde(rename = "timeout-secs", default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
}

/// Report configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// CSV file receiving one row per processed repository
    #[serde(rename = "records-path")]
    pub records_path: String,

    /// CSV file receiving one row per top-level window
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Optional markdown rendering of the run summary
    #[serde(rename = "markdown-path", default)]
    pub markdown_path: Option<String>,

    /// Optional SQLite ledger of runs, outcomes and periods
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Credential lookup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the GitHub token
    #[serde(rename = "token-env", default = "default_token_env")]
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_max_results() -> u64 {
    1000
}

fn default_page_delay_ms() -> u64 {
    10_000
}

fn default_window_days() -> u32 {
    182
}

fn default_reset_margin_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> u32 {
    1
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
