use crate::config::types::{
    ArchiveConfig, AuthConfig, Config, OutputConfig, RateLimitConfig, SearchConfig,
    UserAgentConfig, WindowConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_search_config(&config.search)?;
    validate_window_config(&config.window)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_archive_config(&config.archive)?;
    validate_output_config(&config.output)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_auth_config(&config.auth)?;
    Ok(())
}

/// Validates the search predicate and paging settings
fn validate_search_config(config: &SearchConfig) -> ConfigResult<()> {
    validate_topic(&config.topic)?;
    validate_http_url("api-base-url", &config.api_base_url)?;

    if config.per_page < 1 || config.per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "per-page must be between 1 and 100, got {}",
            config.per_page
        )));
    }

    if config.max_results < 1 {
        return Err(ConfigError::Validation(
            "max-results must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the harvested date range
fn validate_window_config(config: &WindowConfig) -> ConfigResult<()> {
    if config.start > config.finish {
        return Err(ConfigError::Validation(format!(
            "window start {} is after finish {}",
            config.start, config.finish
        )));
    }

    if config.days < 1 {
        return Err(ConfigError::Validation(
            "window days must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry and backoff settings
fn validate_rate_limit_config(config: &RateLimitConfig) -> ConfigResult<()> {
    if config.max_retries < 1 || config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 20, got {}",
            config.max_retries
        )));
    }

    if !(config.backoff_multiplier >= 1.0 && config.backoff_multiplier <= 10.0) {
        return Err(ConfigError::Validation(format!(
            "backoff-multiplier must be between 1.0 and 10.0, got {}",
            config.backoff_multiplier
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates archive download settings
fn validate_archive_config(config: &ArchiveConfig) -> ConfigResult<()> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "archive output-dir cannot be empty".to_string(),
        ));
    }

    validate_http_url("archive base-url", &config.base_url)?;

    if config.default_branch.trim().is_empty() {
        return Err(ConfigError::Validation(
            "default-branch cannot be empty".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "archive concurrency must be between 1 and 16, got {}",
            config.concurrency
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "archive timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates report paths
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.markdown_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "markdown-path cannot be empty when set".to_string(),
        ));
    }

    if matches!(&config.database_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "database-path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

fn validate_auth_config(config: &AuthConfig) -> ConfigResult<()> {
    if config.token_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "token-env cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates a GitHub topic name: lowercase letters, digits and hyphens
fn validate_topic(topic: &str) -> ConfigResult<()> {
    if topic.is_empty() {
        return Err(ConfigError::Validation("topic cannot be empty".to_string()));
    }

    if topic.len() > 50 {
        return Err(ConfigError::Validation(format!(
            "topic '{}' is longer than 50 characters",
            topic
        )));
    }

    if !topic
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "topic must contain only lowercase letters, digits and hyphens, got '{}'",
            topic
        )));
    }

    if topic.starts_with('-') {
        return Err(ConfigError::Validation(format!(
            "topic '{}' cannot start with '-'",
            topic
        )));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> ConfigResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
