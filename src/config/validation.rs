use crate::config::types::{
    CleanupConfig, Config, FetchConfig, ProcessConfig, PublishConfig, RedditConfig, StorageConfig,
};
use crate::pipeline::CONTINUATION_MARKER;
use crate::ConfigError;
use url::Url;

/// Article text every reply must still have room for
const MIN_REPLY_TEXT: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_reddit_config(&config.reddit)?;
    validate_fetch_config(&config.fetch)?;
    validate_process_config(&config.process)?;
    validate_publish_config(&config.publish)?;
    validate_cleanup_config(&config.cleanup)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

fn validate_reddit_config(config: &RedditConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("client_id", &config.client_id),
        ("client_secret", &config.client_secret),
        ("username", &config.username),
        ("password", &config.password),
        ("user_agent", &config.user_agent),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.subreddits.is_empty() {
        return Err(ConfigError::Validation(
            "at least one subreddit must be monitored".to_string(),
        ));
    }

    for subreddit in config.subreddits.iter().chain(&config.distinguishable) {
        validate_subreddit_name(subreddit)?;
    }

    for pattern in &config.banned_domains {
        validate_domain_pattern(pattern)?;
    }

    Url::parse(&config.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_base: {}", e)))?;
    Url::parse(&config.auth_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid auth_base: {}", e)))?;

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch timeout must be at least 1 second".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_process_config(config: &ProcessConfig) -> Result<(), ConfigError> {
    if config.signature.trim().is_empty() {
        return Err(ConfigError::Validation(
            "signature cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_publish_config(config: &PublishConfig) -> Result<(), ConfigError> {
    // Leave room for the continuation marker plus some text
    if config.max_length < 200 {
        return Err(ConfigError::Validation(format!(
            "max_length must be >= 200, got {}",
            config.max_length
        )));
    }

    if !config.coverage.is_empty() && config.coverage_trailer.trim().is_empty() {
        return Err(ConfigError::Validation(
            "coverage_trailer is required when coverage subreddits are set".to_string(),
        ));
    }

    // The last reply carries "\n\n" + trailer, the others the marker
    let reserved = config.coverage_trailer.len() + 2 + CONTINUATION_MARKER.len();
    if !config.coverage.is_empty() && reserved + MIN_REPLY_TEXT > config.max_length {
        return Err(ConfigError::Validation(format!(
            "coverage_trailer is too long: {} bytes leaves less than {} bytes of text per reply \
             with max_length {}",
            config.coverage_trailer.len(),
            MIN_REPLY_TEXT,
            config.max_length
        )));
    }

    Ok(())
}

fn validate_cleanup_config(config: &CleanupConfig) -> Result<(), ConfigError> {
    if config.max_age_hours < 1 {
        return Err(ConfigError::Validation(
            "cleanup max_age_hours must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates a subreddit name (letters, digits, underscores)
fn validate_subreddit_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "Invalid subreddit name: '{}'",
            name
        )));
    }
    Ok(())
}

/// Validates an admission filter pattern
///
/// `*.X` patterns double as file extensions, so their base may be a single
/// label ("*.pdf"). Exact domains must contain at least one dot.
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        validate_domain_string(base)
    } else {
        validate_domain_string(pattern)?;
        if !pattern.contains('.') {
            return Err(ConfigError::InvalidPattern(format!(
                "Domain '{}' must contain at least one dot (e.g., 'example.com')",
                pattern
            )));
        }
        Ok(())
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
