//! Configuration module for Article-Relay
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is assembled once at startup and shared read-only
//! with every worker.
//!
//! # Example
//!
//! ```no_run
//! use article_relay::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("relay.toml")).unwrap();
//! println!("Leasing {} items per cycle", config.storage.batch_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CleanupConfig, Config, DiscoverConfig, FetchConfig, LoopTiming, ProcessConfig, PublishConfig,
    RedditConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
