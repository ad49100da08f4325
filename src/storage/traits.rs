//! Storage traits and error types
//!
//! This module defines the queue-operation interface for storage backends
//! and the associated error types.

use crate::state::ItemStage;
use crate::storage::{
    FetchLease, ItemDetail, ItemListing, ItemRef, NewItem, ProcessLease, PublishLease,
    PurgeReport, QueueDepths, StatRecord,
};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid transition for item {item_id}: {from} -> {to}")]
    InvalidTransition {
        item_id: i64,
        from: ItemStage,
        to: ItemStage,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Queue operations over the persistent store
///
/// Every mutating operation runs in a single transaction under the store's
/// write lock; counter updates ride in the same transaction as the state
/// change they report. Callers pass `now` explicitly.
pub trait Storage: Send + Sync {
    // ===== Discovery =====

    /// Inserts a new item unless its external id is already known
    ///
    /// A new item is immediately due for fetching. Bumps the discovered
    /// counter and the oldest/newest watermarks.
    ///
    /// # Returns
    ///
    /// `true` if a row was created, `false` for a duplicate (no-op)
    fn insert_if_absent(&self, item: &NewItem, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Counts a candidate rejected before insertion
    fn record_skipped(&self, now: DateTime<Utc>) -> StorageResult<()>;

    // ===== Fetch stage =====

    /// Items never fetched whose next attempt is due, in arrival order
    fn lease_for_fetch(&self, now: DateTime<Utc>, limit: u32) -> StorageResult<Vec<FetchLease>>;

    /// Stores the raw payload and marks the item fetched
    ///
    /// Returns `false` (and changes nothing) if the item is gone or was
    /// already fetched.
    fn complete_fetch(
        &self,
        item_id: i64,
        raw_payload: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Increments the retry count and reschedules the next fetch attempt
    ///
    /// # Returns
    ///
    /// The new retry count, so the caller can apply its eviction policy
    fn schedule_retry(&self, item_id: i64, next_attempt_at: DateTime<Utc>) -> StorageResult<u32>;

    /// Deletes an item and its content
    fn evict(&self, item_id: i64, now: DateTime<Utc>) -> StorageResult<bool>;

    // ===== Process stage =====

    /// Fetched, unprocessed items that have a raw payload
    fn lease_for_process(&self, limit: u32) -> StorageResult<Vec<ProcessLease>>;

    /// Stores the formatted text and marks the item processed
    fn complete_process(
        &self,
        item_id: i64,
        formatted_text: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    // ===== Publish stage =====

    /// Processed, unpublished items that have formatted text
    fn lease_for_publish(&self, limit: u32) -> StorageResult<Vec<PublishLease>>;

    /// Marks the item published
    fn complete_publish(&self, item_id: i64, now: DateTime<Utc>) -> StorageResult<bool>;

    // ===== Cleanup =====

    /// Deletes expired published items and unprocessable dead ends
    fn purge_stale(&self, now: DateTime<Utc>, max_age: Duration) -> StorageResult<PurgeReport>;

    // ===== Inspection =====

    /// All counters
    fn load_stats(&self) -> StorageResult<Vec<StatRecord>>;

    /// Pending work per stage
    fn queue_depths(&self, now: DateTime<Utc>) -> StorageResult<QueueDepths>;

    /// One item with its content
    fn get_item(&self, item: &ItemRef) -> StorageResult<Option<ItemDetail>>;

    /// Items newest first
    fn list_items(&self, limit: Option<u32>, offset: Option<u32>)
        -> StorageResult<Vec<ItemListing>>;

    // ===== Admin resets (backward only) =====

    /// Moves a processed or published item back to "fetched"
    fn reset_processed(&self, item: &ItemRef) -> StorageResult<bool>;

    /// Moves a published item back to "processed"
    ///
    /// Fails with `InvalidTransition` for items that were never processed.
    fn reset_to_processed(&self, item: &ItemRef) -> StorageResult<bool>;

    /// Moves an item back to "discovered", dropping its content
    fn reset_item(&self, item: &ItemRef, now: DateTime<Utc>) -> StorageResult<bool>;
}
