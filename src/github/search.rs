//! Repository search: query building and response decoding

use crate::config::SearchConfig;
use crate::github::client::{ApiError, RateLimitedClient};
use crate::window::{CountOracle, DateWindow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Endpoint of the repository search, relative to the API root
pub const SEARCH_ENDPOINT: &str = "search/repositories";

/// One repository from a search response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoItem {
    /// Owner login
    pub owner: String,

    /// Repository name
    pub name: String,

    /// `owner/name`
    pub full_name: String,

    /// HTTPS clone URL
    pub clone_url: String,

    /// Default branch, when the API reported one
    pub default_branch: Option<String>,

    /// Declared topics; `None` when the response carried no topic data
    pub topics: Option<Vec<String>>,
}

impl RepoItem {
    /// Returns true when the declared topics include `topic` (ASCII case-insensitive)
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|t| t.eq_ignore_ascii_case(topic))
    }

    /// Returns true when the response carried no usable topic data
    pub fn topics_missing(&self) -> bool {
        self.topics.as_ref().map_or(true, |topics| topics.is_empty())
    }

    /// Declared topics joined with `;`
    pub fn topics_joined(&self) -> String {
        self.topics.as_deref().unwrap_or_default().join(";")
    }
}

/// One decoded search response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    /// Total matches the API reports, which may exceed what it will return
    pub total_count: u64,

    /// Items of the requested page, in API order
    pub items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    owner: RawOwner,
    name: String,
    full_name: String,
    #[serde(default)]
    clone_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

impl From<RawItem> for RepoItem {
    fn from(raw: RawItem) -> Self {
        Self {
            owner: raw.owner.login,
            name: raw.name,
            full_name: raw.full_name,
            clone_url: raw.clone_url,
            default_branch: raw.default_branch.filter(|b| !b.trim().is_empty()),
            topics: raw.topics,
        }
    }
}

impl SearchResult {
    /// Decodes a search response body
    pub fn from_json(body: Value) -> Result<Self, serde_json::Error> {
        let raw: RawSearchResponse = serde_json::from_value(body)?;
        Ok(Self {
            total_count: raw.total_count,
            items: raw.items.into_iter().map(RepoItem::from).collect(),
        })
    }
}

/// Builds the search predicate for one window: `topic:<tag> created:<from>..<to>`
pub fn build_query(topic: &str, window: &DateWindow) -> String {
    format!("topic:{} created:{}", topic, window)
}

/// Topic search over the rate-limited client
pub struct SearchClient {
    client: RateLimitedClient,
    topic: String,
    per_page: u32,
    cap: u64,
    page_delay: Duration,
}

impl SearchClient {
    pub fn new(client: RateLimitedClient, config: &SearchConfig) -> Self {
        Self {
            client,
            topic: config.topic.clone(),
            per_page: config.per_page.clamp(1, 100),
            cap: config.max_results,
            page_delay: Duration::from_millis(config.page_delay_ms),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Maximum number of results one query can reach
    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// Delay inserted before every page after the first
    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    /// Fetches one page of results for `window`
    pub async fn search(
        &self,
        window: &DateWindow,
        page: u32,
        per_page: u32,
    ) -> Result<SearchResult, ApiError> {
        let params = [
            ("q", build_query(&self.topic, window)),
            ("per_page", per_page.to_string()),
            ("page", page.max(1).to_string()),
        ];
        let body = self.client.request(SEARCH_ENDPOINT, &params).await?;

        SearchResult::from_json(body).map_err(|e| ApiError::Decode {
            url: SEARCH_ENDPOINT.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetches page `page` at the configured page size
    pub async fn search_page(&self, window: &DateWindow, page: u32) -> Result<SearchResult, ApiError> {
        self.search(window, page, self.per_page).await
    }
}

#[async_trait]
impl CountOracle for SearchClient {
    /// Probes the total count with a single-item page
    async fn count(&self, window: &DateWindow) -> Result<u64, ApiError> {
        let result = self.search(window, 1, 1).await?;
        Ok(result.total_count)
    }
}
