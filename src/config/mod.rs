//! Configuration module for Topic-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the GitHub token from the environment.
//!
//! # Example
//!
//! ```no_run
//! use topic_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting topic: {}", config.search.topic);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ArchiveConfig, AuthConfig, Config, OutputConfig, RateLimitConfig, SearchConfig, TopicPolicy,
    UserAgentConfig, WindowConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_token};
