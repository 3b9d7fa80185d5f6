//! Topic-Harvest: a date-partitioned repository archive harvester
//!
//! This crate enumerates repositories carrying a given topic through GitHub's
//! repository search, splitting the creation-date range so that no single query
//! runs into the search API's result cap, and downloads a source archive for
//! every repository it finds while respecting the API's rate limits.

pub mod config;
pub mod crawler;
pub mod github;
pub mod output;
pub mod state;
pub mod storage;
pub mod window;

use thiserror::Error;

/// Main error type for Topic-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GitHub API error: {0}")]
    Api(#[from] github::ApiError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Missing GitHub token: set the {var} environment variable")]
    MissingToken { var: String },

    #[error("Invalid date window: {start} is after {end}")]
    InvalidWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Topic-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{DownloadOutcome, DownloadStatus, PeriodStats};
pub use window::{partition, DateWindow, LeafWindow};
