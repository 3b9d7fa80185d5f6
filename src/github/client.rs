//! Rate-limit aware GitHub API client
//!
//! This module handles every search request the harvester makes, including:
//! - Building the shared HTTP client with token and user agent headers
//! - Waiting out an exhausted quota until its advertised reset time
//! - Bounded exponential backoff for throttled and server-side failures
//! - Classifying the remaining failures as fatal

use crate::config::{Config, RateLimitConfig, UserAgentConfig};
use crate::github::sleeper::Sleeper;
use crate::github::normalize_base_url;
use crate::HarvestError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Wait used when an exhausted quota comes without a reset timestamp
const MISSING_RESET_WAIT: Duration = Duration::from_secs(60);

/// Upper bound for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Errors surfaced by the API client
///
/// Throttling and transient failures are retried inside
/// [`RateLimitedClient::request`]; anything returned from it aborts the run.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub rejected the credentials (HTTP 401)")]
    Unauthorized,

    #[error("HTTP {status} from {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

impl ApiError {
    /// Returns true for failures that a later identical request might not repeat
    ///
    /// These never leave the client directly; the retry loop turns an exhausted
    /// budget into [`ApiError::RetriesExhausted`].
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => is_transient_transport(source),
            Self::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Timeouts, refused or reset connections and bodies that stopped mid-stream
fn is_transient_transport(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_body() || error.is_request()
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Retry budget and backoff growth for transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed before a transient failure becomes fatal
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Growth factor applied per retry
    pub multiplier: f64,

    /// Added on top of the advertised quota reset time
    pub reset_margin: Duration,

    /// Timeout of a single request
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            reset_margin: Duration::from_secs(config.reset_margin_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Delay before retry number `retry` (zero-based): `initial × multiplier^retry`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= MAX_BACKOFF.as_secs_f64() {
            return MAX_BACKOFF;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Computes how long to wait when the response reports an exhausted quota
///
/// Returns `None` unless `X-RateLimit-Remaining` is `0`. The wait runs until the
/// `X-RateLimit-Reset` epoch second plus `margin`; a reset already in the past
/// waits only for the margin.
pub fn quota_reset_wait(headers: &HeaderMap, now_epoch: i64, margin: Duration) -> Option<Duration> {
    let remaining = header_str(headers, "x-ratelimit-remaining")?;
    if remaining.trim() != "0" {
        return None;
    }

    let wait = match header_str(headers, "x-ratelimit-reset").and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(reset) => {
            let secs = reset.saturating_sub(now_epoch).max(0);
            Duration::from_secs(u64::try_from(secs).unwrap_or(0))
        }
        None => MISSING_RESET_WAIT,
    };

    Some(wait + margin)
}

/// Reads a `Retry-After` header given in seconds
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, "retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Builds the HTTP client shared by searches and archive downloads
///
/// The token is sent as a bearer `Authorization` header on every request and
/// marked sensitive so it never shows up in debug output. Per-request timeouts
/// are applied by the callers.
pub fn build_http_client(user_agent: &UserAgentConfig, token: &str) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "x-github-api-version",
        HeaderValue::from_static("2022-11-28"),
    );

    let client = Client::builder()
        .user_agent(user_agent.header_value())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Issues GET requests against the GitHub API, absorbing throttling
pub struct RateLimitedClient {
    http: Client,
    base_url: Url,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimitedClient {
    /// Creates a client over an existing HTTP client
    ///
    /// `base_url` is the API root (e.g. `https://api.github.com`); endpoints are
    /// resolved relative to it.
    pub fn new(
        http: Client,
        base_url: &str,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, HarvestError> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            policy,
            sleeper,
        })
    }

    /// Creates a client from the harvest configuration
    pub fn from_config(
        config: &Config,
        http: Client,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, HarvestError> {
        Self::new(
            http,
            &config.search.api_base_url,
            RetryPolicy::from_config(&config.rate_limit),
            sleeper,
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Waits through the client's sleeper
    pub async fn pause(&self, duration: Duration) {
        self.sleeper.sleep(duration).await;
    }

    /// Sends `GET <base>/<endpoint>?<params>` and returns the decoded JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 403/429 with `X-RateLimit-Remaining: 0` | Wait until reset + margin, retry (unbounded) |
    /// | 403/429 with `Retry-After` | Wait that long, retry (uses budget) |
    /// | 429, 5xx | Exponential backoff, retry (uses budget) |
    /// | Timeout, connection failure, truncated body | Exponential backoff, retry (uses budget) |
    /// | 401 | `Unauthorized` |
    /// | Other non-success status | `Status` |
    ///
    /// # Errors
    ///
    /// Every returned error is fatal for the current run.
    pub async fn request(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|source| ApiError::Endpoint {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let mut failures: u32 = 0;

        loop {
            tracing::debug!("GET {} {:?}", url, params);
            let sent = self
                .http
                .get(url.clone())
                .query(params)
                .timeout(self.policy.request_timeout)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(source) => {
                    let error = ApiError::Http {
                        url: url.to_string(),
                        source,
                    };
                    if !error.is_transient() {
                        return Err(error);
                    }
                    failures += 1;
                    self.backoff_or_give_up(&url, failures, error.to_string(), None)
                        .await?;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                match response.bytes().await {
                    Ok(body) => {
                        return serde_json::from_slice::<Value>(&body).map_err(|e| ApiError::Decode {
                            url: url.to_string(),
                            message: e.to_string(),
                        });
                    }
                    Err(source) => {
                        // Headers arrived but the body was cut short
                        let error = ApiError::Http {
                            url: url.to_string(),
                            source,
                        };
                        if !error.is_transient() {
                            return Err(error);
                        }
                        failures += 1;
                        self.backoff_or_give_up(&url, failures, error.to_string(), None)
                            .await?;
                        continue;
                    }
                }
            }

            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                let now = chrono::Utc::now().timestamp();
                if let Some(wait) = quota_reset_wait(response.headers(), now, self.policy.reset_margin) {
                    tracing::warn!(
                        "Rate limit exhausted (HTTP {}), sleeping {}s until reset",
                        status.as_u16(),
                        wait.as_secs()
                    );
                    self.sleeper.sleep(wait).await;
                    continue;
                }

                if let Some(wait) = retry_after(response.headers()) {
                    failures += 1;
                    self.backoff_or_give_up(
                        &url,
                        failures,
                        format!("HTTP {} (secondary rate limit)", status.as_u16()),
                        Some(wait),
                    )
                    .await?;
                    continue;
                }
            }

            if is_retryable_status(status.as_u16()) {
                failures += 1;
                self.backoff_or_give_up(&url, failures, format!("HTTP {}", status.as_u16()), None)
                    .await?;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                return Err(ApiError::Unauthorized);
            }

            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
    }

    /// Sleeps before the next attempt, or fails once the budget is spent
    async fn backoff_or_give_up(
        &self,
        url: &Url,
        failures: u32,
        last_error: String,
        wait: Option<Duration>,
    ) -> Result<(), ApiError> {
        if failures >= self.policy.max_attempts {
            tracing::error!(
                "Giving up on {} after {} attempts: {}",
                url,
                failures,
                last_error
            );
            return Err(ApiError::RetriesExhausted {
                url: url.to_string(),
                attempts: failures,
                last_error,
            });
        }

        let delay = wait.unwrap_or_else(|| self.policy.backoff(failures - 1));
        tracing::warn!(
            "Attempt {}/{} for {} failed ({}), retrying in {:?}",
            failures,
            self.policy.max_attempts,
            url,
            last_error,
            delay
        );
        self.sleeper.sleep(delay).await;
        Ok(())
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderName;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn create_test_user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        }
    }

    #[test]
    fn test_quota_reset_wait_counts_to_reset_plus_margin() {
        let map = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "1030")]);
        let wait = quota_reset_wait(&map, 1000, Duration::from_secs(5));
        assert_eq!(wait, Some(Duration::from_secs(35)));
    }

    #[test]
    fn test_quota_reset_wait_past_reset_waits_margin_only() {
        let map = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "900")]);
        let wait = quota_reset_wait(&map, 1000, Duration::from_secs(5));
        assert_eq!(wait, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_quota_reset_wait_ignores_remaining_quota() {
        let map = headers(&[("x-ratelimit-remaining", "12"), ("x-ratelimit-reset", "1030")]);
        assert_eq!(quota_reset_wait(&map, 1000, Duration::from_secs(5)), None);
        assert_eq!(quota_reset_wait(&HeaderMap::new(), 1000, Duration::from_secs(5)), None);
    }

    #[test]
    fn test_quota_reset_wait_without_reset_header() {
        let map = headers(&[("x-ratelimit-remaining", "0")]);
        let wait = quota_reset_wait(&map, 1000, Duration::from_secs(5));
        assert_eq!(wait, Some(Duration::from_secs(65)));
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(
            retry_after(&headers(&[("retry-after", "42")])),
            Some(Duration::from_secs(42))
        );
        assert_eq!(retry_after(&headers(&[("retry-after", "soon")])), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_backoff_grows_multiplicatively() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
            reset_margin: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        };

        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(40), MAX_BACKOFF);
    }

    #[test]
    fn test_default_policy_matches_config_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.reset_margin, Duration::from_secs(5));
    }

    #[test]
    fn test_status_transience() {
        let status = |code| ApiError::Status {
            url: "https://api.github.com/search/repositories".to_string(),
            status: code,
            message: String::new(),
        };

        assert!(status(502).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(422).is_transient());
        assert!(!ApiError::Unauthorized.is_transient());
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_user_agent(), "ghp_test");
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_rejects_control_characters_in_token() {
        let client = build_http_client(&create_test_user_agent(), "bad\ntoken");
        assert!(matches!(client, Err(HarvestError::InvalidHeader(_))));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
