//! GitHub search API access
//!
//! This module contains everything that talks to the search API:
//! - [`RateLimitedClient`]: authenticated GETs with quota and backoff handling
//! - [`SearchClient`]: the topic/date predicate and response decoding
//! - [`PageWalker`]: lazy page-by-page iteration over one window
//! - [`Sleeper`]: the waiting strategy shared by all of the above

mod client;
mod pages;
mod search;
mod sleeper;

pub use client::{
    build_http_client, quota_reset_wait, retry_after, ApiError, RateLimitedClient, RetryPolicy,
};
pub use pages::{pages_for, PageWalker};
pub use search::{build_query, RepoItem, SearchClient, SearchResult, SEARCH_ENDPOINT};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};

use url::Url;

/// Parses a base URL so relative endpoints resolve beneath its path
///
/// `https://ghe.example.com/api/v3` and `https://ghe.example.com/api/v3/` both
/// become the latter; without the trailing slash `Url::join` would drop `v3`.
pub fn normalize_base_url(base: &str) -> Result<Url, url::ParseError> {
    let trimmed = base.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{}/", trimmed))
    }
}
