//! Article-Relay: a durable multi-stage article mirroring pipeline
//!
//! This crate discovers link submissions, fetches the linked articles, turns
//! them into formatted text and publishes that text back as replies. Every
//! stage transition is persisted in SQLite so work survives restarts and a
//! failing item never blocks the rest of the queue.

pub mod config;
pub mod extract;
pub mod filter;
pub mod http;
pub mod inspect;
pub mod pipeline;
pub mod queue;
pub mod reddit;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Article-Relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Reddit API error: {0}")]
    Reddit(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
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

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Article-Relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use filter::AdmissionFilter;
pub use state::ItemStage;
pub use storage::{SqliteStorage, Storage, StorageError};
