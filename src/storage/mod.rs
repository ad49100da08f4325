//! Storage module for persisting pipeline state
//!
//! This module handles all database operations for the relay, including:
//! - SQLite database initialization and schema management
//! - The transactional queue operations that move items between stages
//! - Aggregate counters updated in the same transaction as the state change
//! - Read-only inspection and backward-only admin resets

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ItemStage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Default number of items leased per stage cycle
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A candidate accepted by discovery, ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub external_id: String,
    pub origin: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Represents an item row in the database
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub id: i64,
    pub external_id: String,
    pub origin: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub discovered_at: DateTime<Utc>,
    pub fetch_due_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl ItemRecord {
    /// The furthest stage this item has completed
    pub fn stage(&self) -> Option<ItemStage> {
        ItemStage::from_markers(
            self.fetched_at.is_some(),
            self.processed_at.is_some(),
            self.published_at.is_some(),
        )
    }
}

/// An item together with its content payloads
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub item: ItemRecord,
    pub raw_payload: Option<String>,
    pub formatted_text: Option<String>,
}

/// An item plus content presence flags, used for listings
#[derive(Debug, Clone, Serialize)]
pub struct ItemListing {
    #[serde(flatten)]
    pub item: ItemRecord,
    pub has_raw_payload: bool,
    pub has_formatted_text: bool,
}

/// An item due for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLease {
    pub item_id: i64,
    pub url: String,
    pub retry_count: u32,
}

/// A fetched item waiting for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLease {
    pub item_id: i64,
    pub url: String,
    pub raw_payload: String,
}

/// A processed item waiting to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishLease {
    pub item_id: i64,
    pub external_id: String,
    pub origin: String,
    pub formatted_text: String,
}

/// Identifies an item either by row id or by its external id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Id(i64),
    ExternalId(String),
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{}", id),
            Self::ExternalId(external_id) => write!(f, "{}", external_id),
        }
    }
}

/// Rows removed by one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Published items older than the maximum age
    pub expired: u64,
    /// Fetched items that can never be processed
    pub dead_ends: u64,
}

impl PurgeReport {
    pub fn total(&self) -> u64 {
        self.expired + self.dead_ends
    }
}

/// Pending work per stage, computed from item rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub total_items: u64,
    pub to_fetch: u64,
    pub due_for_fetch: u64,
    pub to_process: u64,
    pub to_publish: u64,
    pub published: u64,
    pub retrying: u64,
    pub raw_payloads: u64,
    pub formatted_texts: u64,
}

/// A named counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    pub name: StatName,
    pub value: i64,
    pub updated_at: DateTime<Utc>,
}

/// Names of the observability counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    TotalDiscovered,
    Fetched,
    Processed,
    Published,
    Skipped,
    Evicted,
    /// Smallest upstream creation time seen (unix seconds, 0 = unset)
    OldestSeen,
    /// Largest upstream creation time seen (unix seconds, 0 = unset)
    NewestSeen,
}

impl StatName {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::TotalDiscovered => "total_discovered",
            Self::Fetched => "fetched",
            Self::Processed => "processed",
            Self::Published => "published",
            Self::Skipped => "skipped",
            Self::Evicted => "evicted",
            Self::OldestSeen => "oldest_seen",
            Self::NewestSeen => "newest_seen",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "total_discovered" => Some(Self::TotalDiscovered),
            "fetched" => Some(Self::Fetched),
            "processed" => Some(Self::Processed),
            "published" => Some(Self::Published),
            "skipped" => Some(Self::Skipped),
            "evicted" => Some(Self::Evicted),
            "oldest_seen" => Some(Self::OldestSeen),
            "newest_seen" => Some(Self::NewestSeen),
            _ => None,
        }
    }

    pub fn all() -> [Self; 8] {
        [
            Self::TotalDiscovered,
            Self::Fetched,
            Self::Processed,
            Self::Published,
            Self::Skipped,
            Self::Evicted,
            Self::OldestSeen,
            Self::NewestSeen,
        ]
    }

    /// Watermarks hold timestamps rather than counts
    pub fn is_watermark(&self) -> bool {
        matches!(self, Self::OldestSeen | Self::NewestSeen)
    }
}
