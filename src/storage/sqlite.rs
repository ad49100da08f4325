//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! All writes go through one connection guarded by a mutex and run as
//! `IMMEDIATE` transactions; reads use a second connection so inspection
//! never waits behind a worker under WAL.

use crate::state::ItemStage;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    FetchLease, ItemDetail, ItemListing, ItemRecord, ItemRef, NewItem, ProcessLease,
    PublishLease, PurgeReport, QueueDepths, StatName, StatRecord,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;

const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

const ITEM_COLUMNS: &str = "i.id, i.external_id, i.origin, i.url, i.created_at, \
     i.discovered_at, i.fetch_due_at, i.fetched_at, i.processed_at, i.published_at, \
     i.retry_count";

/// SQLite storage backend
pub struct SqliteStorage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer = open_connection(path)?;
        initialize_schema(&writer, Utc::now().timestamp())?;
        let reader = open_connection(path)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    /// Runs `op` inside an `IMMEDIATE` transaction while holding the write lock
    ///
    /// The transaction commits only if `op` returns `Ok`.
    pub fn write<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut conn = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `op` against the read connection
    pub fn read<T>(&self, op: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self.reader.lock().map_err(|_| StorageError::LockPoisoned)?;
        op(&conn)
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    // Configure SQLite for concurrent readers alongside one writer
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    Ok(conn)
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRecord> {
    Ok(ItemRecord {
        id: row.get(0)?,
        external_id: row.get(1)?,
        origin: row.get(2)?,
        url: row.get(3)?,
        created_at: from_ts(row.get(4)?),
        discovered_at: from_ts(row.get(5)?),
        fetch_due_at: row.get::<_, Option<i64>>(6)?.map(from_ts),
        fetched_at: row.get::<_, Option<i64>>(7)?.map(from_ts),
        processed_at: row.get::<_, Option<i64>>(8)?.map(from_ts),
        published_at: row.get::<_, Option<i64>>(9)?.map(from_ts),
        retry_count: row.get(10)?,
    })
}

/// Looks up an item row (without content) by id or external id
fn locate(conn: &Connection, item: &ItemRef) -> StorageResult<Option<ItemRecord>> {
    let record = match item {
        ItemRef::Id(id) => conn
            .query_row(
                &format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS),
                params![id],
                item_from_row,
            )
            .optional()?,
        ItemRef::ExternalId(external_id) => conn
            .query_row(
                &format!("SELECT {} FROM items i WHERE i.external_id = ?1", ITEM_COLUMNS),
                params![external_id],
                item_from_row,
            )
            .optional()?,
    };
    Ok(record)
}

fn bump_stat(conn: &Connection, stat: StatName, delta: i64, now: i64) -> StorageResult<()> {
    conn.execute(
        "UPDATE stats SET value = value + ?1, updated_at = ?2 WHERE name = ?3",
        params![delta, now, stat.to_db_string()],
    )?;
    Ok(())
}

fn update_watermarks(conn: &Connection, created_at: i64, now: i64) -> StorageResult<()> {
    conn.execute(
        "UPDATE stats SET value = ?1, updated_at = ?2
         WHERE name = ?3 AND (value = 0 OR value > ?1)",
        params![created_at, now, StatName::OldestSeen.to_db_string()],
    )?;
    conn.execute(
        "UPDATE stats SET value = ?1, updated_at = ?2 WHERE name = ?3 AND value < ?1",
        params![created_at, now, StatName::NewestSeen.to_db_string()],
    )?;
    Ok(())
}

fn delete_items(conn: &Connection, ids: &[i64]) -> StorageResult<u64> {
    let mut removed = 0;
    let mut delete_content = conn.prepare("DELETE FROM content WHERE item_id = ?1")?;
    let mut delete_item = conn.prepare("DELETE FROM items WHERE id = ?1")?;
    for id in ids {
        delete_content.execute(params![id])?;
        removed += delete_item.execute(params![id])? as u64;
    }
    Ok(removed)
}

impl Storage for SqliteStorage {
    // ===== Discovery =====

    fn insert_if_absent(&self, item: &NewItem, now: DateTime<Utc>) -> StorageResult<bool> {
        let now = now.timestamp();
        let created_at = item.created_at.timestamp();
        self.write(|tx| {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO items
                    (external_id, origin, url, created_at, discovered_at, fetch_due_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![item.external_id, item.origin, item.url, created_at, now],
            )?;
            if inserted == 0 {
                return Ok(false);
            }

            bump_stat(tx, StatName::TotalDiscovered, 1, now)?;
            update_watermarks(tx, created_at, now)?;
            Ok(true)
        })
    }

    fn record_skipped(&self, now: DateTime<Utc>) -> StorageResult<()> {
        self.write(|tx| bump_stat(tx, StatName::Skipped, 1, now.timestamp()))
    }

    // ===== Fetch stage =====

    fn lease_for_fetch(&self, now: DateTime<Utc>, limit: u32) -> StorageResult<Vec<FetchLease>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, url, retry_count FROM items
                 WHERE fetched_at IS NULL AND fetch_due_at IS NOT NULL AND fetch_due_at <= ?1
                 ORDER BY id
                 LIMIT ?2",
            )?;
            let leases = stmt
                .query_map(params![now.timestamp(), limit], |row| {
                    Ok(FetchLease {
                        item_id: row.get(0)?,
                        url: row.get(1)?,
                        retry_count: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(leases)
        })
    }

    fn complete_fetch(
        &self,
        item_id: i64,
        raw_payload: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let now = now.timestamp();
        self.write(|tx| {
            let updated = tx.execute(
                "UPDATE items SET fetched_at = ?1, fetch_due_at = NULL
                 WHERE id = ?2 AND fetched_at IS NULL",
                params![now, item_id],
            )?;
            if updated == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO content (item_id, raw_payload) VALUES (?1, ?2)
                 ON CONFLICT(item_id) DO UPDATE SET raw_payload = excluded.raw_payload",
                params![item_id, raw_payload],
            )?;
            bump_stat(tx, StatName::Fetched, 1, now)?;
            Ok(true)
        })
    }

    fn schedule_retry(&self, item_id: i64, next_attempt_at: DateTime<Utc>) -> StorageResult<u32> {
        self.write(|tx| {
            let retry_count = tx
                .query_row(
                    "UPDATE items SET retry_count = retry_count + 1, fetch_due_at = ?1
                     WHERE id = ?2 AND fetched_at IS NULL
                     RETURNING retry_count",
                    params![next_attempt_at.timestamp(), item_id],
                    |row| row.get::<_, u32>(0),
                )
                .optional()?;
            retry_count.ok_or_else(|| StorageError::ItemNotFound(format!("#{}", item_id)))
        })
    }

    fn evict(&self, item_id: i64, now: DateTime<Utc>) -> StorageResult<bool> {
        self.write(|tx| {
            let removed = delete_items(tx, &[item_id])?;
            if removed == 0 {
                return Ok(false);
            }
            bump_stat(tx, StatName::Evicted, 1, now.timestamp())?;
            Ok(true)
        })
    }

    // ===== Process stage =====

    fn lease_for_process(&self, limit: u32) -> StorageResult<Vec<ProcessLease>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.url, c.raw_payload
                 FROM items i JOIN content c ON c.item_id = i.id
                 WHERE i.fetched_at IS NOT NULL AND i.processed_at IS NULL
                   AND c.raw_payload IS NOT NULL
                 ORDER BY i.fetched_at, i.id
                 LIMIT ?1",
            )?;
            let leases = stmt
                .query_map(params![limit], |row| {
                    Ok(ProcessLease {
                        item_id: row.get(0)?,
                        url: row.get(1)?,
                        raw_payload: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(leases)
        })
    }

    fn complete_process(
        &self,
        item_id: i64,
        formatted_text: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let now = now.timestamp();
        self.write(|tx| {
            let updated = tx.execute(
                "UPDATE items SET processed_at = ?1
                 WHERE id = ?2 AND fetched_at IS NOT NULL AND processed_at IS NULL
                   AND EXISTS (
                       SELECT 1 FROM content WHERE item_id = ?2 AND raw_payload IS NOT NULL
                   )",
                params![now, item_id],
            )?;
            if updated == 0 {
                return Ok(false);
            }

            tx.execute(
                "UPDATE content SET formatted_text = ?1 WHERE item_id = ?2",
                params![formatted_text, item_id],
            )?;
            bump_stat(tx, StatName::Processed, 1, now)?;
            Ok(true)
        })
    }

    // ===== Publish stage =====

    fn lease_for_publish(&self, limit: u32) -> StorageResult<Vec<PublishLease>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.external_id, i.origin, c.formatted_text
                 FROM items i JOIN content c ON c.item_id = i.id
                 WHERE i.processed_at IS NOT NULL AND i.published_at IS NULL
                   AND c.formatted_text IS NOT NULL
                 ORDER BY i.processed_at, i.id
                 LIMIT ?1",
            )?;
            let leases = stmt
                .query_map(params![limit], |row| {
                    Ok(PublishLease {
                        item_id: row.get(0)?,
                        external_id: row.get(1)?,
                        origin: row.get(2)?,
                        formatted_text: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(leases)
        })
    }

    fn complete_publish(&self, item_id: i64, now: DateTime<Utc>) -> StorageResult<bool> {
        let now = now.timestamp();
        self.write(|tx| {
            let updated = tx.execute(
                "UPDATE items SET published_at = ?1
                 WHERE id = ?2 AND processed_at IS NOT NULL AND published_at IS NULL
                   AND EXISTS (
                       SELECT 1 FROM content WHERE item_id = ?2 AND formatted_text IS NOT NULL
                   )",
                params![now, item_id],
            )?;
            if updated == 0 {
                return Ok(false);
            }
            bump_stat(tx, StatName::Published, 1, now)?;
            Ok(true)
        })
    }

    // ===== Cleanup =====

    fn purge_stale(&self, now: DateTime<Utc>, max_age: Duration) -> StorageResult<PurgeReport> {
        let cutoff = (now - max_age).timestamp();
        self.write(|tx| {
            let expired: Vec<i64> = tx
                .prepare("SELECT id FROM items WHERE published_at IS NOT NULL AND published_at < ?1")?
                .query_map(params![cutoff], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;

            // Fetched but unprocessable: no payload at all, or stuck past the age limit
            let dead_ends: Vec<i64> = tx
                .prepare(
                    "SELECT i.id FROM items i LEFT JOIN content c ON c.item_id = i.id
                     WHERE i.fetched_at IS NOT NULL AND i.processed_at IS NULL
                       AND c.formatted_text IS NULL
                       AND (c.raw_payload IS NULL OR i.fetched_at < ?1)",
                )?
                .query_map(params![cutoff], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(PurgeReport {
                expired: delete_items(tx, &expired)?,
                dead_ends: delete_items(tx, &dead_ends)?,
            })
        })
    }

    // ===== Inspection =====

    fn load_stats(&self) -> StorageResult<Vec<StatRecord>> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT name, value, updated_at FROM stats")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stats: Vec<StatRecord> = rows
                .into_iter()
                .filter_map(|(name, value, updated_at)| {
                    StatName::from_db_string(&name).map(|name| StatRecord {
                        name,
                        value,
                        updated_at: from_ts(updated_at),
                    })
                })
                .collect();
            stats.sort_by_key(|stat| StatName::all().iter().position(|s| *s == stat.name));
            Ok(stats)
        })
    }

    fn queue_depths(&self, now: DateTime<Utc>) -> StorageResult<QueueDepths> {
        self.read(|conn| {
            let mut depths = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(fetched_at IS NULL), 0),
                        COALESCE(SUM(fetched_at IS NULL AND fetch_due_at <= ?1), 0),
                        COALESCE(SUM(fetched_at IS NOT NULL AND processed_at IS NULL), 0),
                        COALESCE(SUM(processed_at IS NOT NULL AND published_at IS NULL), 0),
                        COALESCE(SUM(published_at IS NOT NULL), 0),
                        COALESCE(SUM(fetched_at IS NULL AND retry_count > 0), 0)
                 FROM items",
                params![now.timestamp()],
                |row| {
                    Ok(QueueDepths {
                        total_items: row.get::<_, i64>(0)? as u64,
                        to_fetch: row.get::<_, i64>(1)? as u64,
                        due_for_fetch: row.get::<_, i64>(2)? as u64,
                        to_process: row.get::<_, i64>(3)? as u64,
                        to_publish: row.get::<_, i64>(4)? as u64,
                        published: row.get::<_, i64>(5)? as u64,
                        retrying: row.get::<_, i64>(6)? as u64,
                        ..QueueDepths::default()
                    })
                },
            )?;

            let (raw_payloads, formatted_texts) = conn.query_row(
                "SELECT COUNT(raw_payload), COUNT(formatted_text) FROM content",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )?;
            depths.raw_payloads = raw_payloads as u64;
            depths.formatted_texts = formatted_texts as u64;

            Ok(depths)
        })
    }

    fn get_item(&self, item: &ItemRef) -> StorageResult<Option<ItemDetail>> {
        self.read(|conn| {
            let (filter, key): (&str, &dyn rusqlite::ToSql) = match item {
                ItemRef::Id(id) => ("i.id = ?1", id),
                ItemRef::ExternalId(external_id) => ("i.external_id = ?1", external_id),
            };
            let detail = conn
                .query_row(
                    &format!(
                        "SELECT {}, c.raw_payload, c.formatted_text
                         FROM items i LEFT JOIN content c ON c.item_id = i.id
                         WHERE {}",
                        ITEM_COLUMNS, filter
                    ),
                    &[key][..],
                    |row| {
                        Ok(ItemDetail {
                            item: item_from_row(row)?,
                            raw_payload: row.get(11)?,
                            formatted_text: row.get(12)?,
                        })
                    },
                )
                .optional()?;
            Ok(detail)
        })
    }

    fn list_items(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> StorageResult<Vec<ItemListing>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let offset = offset.map(i64::from).unwrap_or(0);
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, c.raw_payload IS NOT NULL, c.formatted_text IS NOT NULL
                 FROM items i LEFT JOIN content c ON c.item_id = i.id
                 ORDER BY i.id DESC
                 LIMIT ?1 OFFSET ?2",
                ITEM_COLUMNS
            ))?;
            let items = stmt
                .query_map(params![limit, offset], |row| {
                    Ok(ItemListing {
                        item: item_from_row(row)?,
                        has_raw_payload: row.get::<_, Option<bool>>(11)?.unwrap_or(false),
                        has_formatted_text: row.get::<_, Option<bool>>(12)?.unwrap_or(false),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }

    // ===== Admin resets =====

    fn reset_processed(&self, item: &ItemRef) -> StorageResult<bool> {
        self.write(|tx| {
            let Some(record) = locate(tx, item)? else {
                return Ok(false);
            };
            if record.processed_at.is_none() {
                return Ok(true);
            }

            tx.execute(
                "UPDATE items SET processed_at = NULL, published_at = NULL WHERE id = ?1",
                params![record.id],
            )?;
            tx.execute(
                "UPDATE content SET formatted_text = NULL WHERE item_id = ?1",
                params![record.id],
            )?;
            Ok(true)
        })
    }

    fn reset_to_processed(&self, item: &ItemRef) -> StorageResult<bool> {
        self.write(|tx| {
            let Some(record) = locate(tx, item)? else {
                return Ok(false);
            };

            let has_text: bool = tx
                .query_row(
                    "SELECT formatted_text IS NOT NULL FROM content WHERE item_id = ?1",
                    params![record.id],
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or(false);

            if record.processed_at.is_none() || !has_text {
                return Err(StorageError::InvalidTransition {
                    item_id: record.id,
                    from: record.stage().unwrap_or(ItemStage::Discovered),
                    to: ItemStage::Processed,
                });
            }

            tx.execute(
                "UPDATE items SET published_at = NULL WHERE id = ?1",
                params![record.id],
            )?;
            Ok(true)
        })
    }

    fn reset_item(&self, item: &ItemRef, now: DateTime<Utc>) -> StorageResult<bool> {
        self.write(|tx| {
            let Some(record) = locate(tx, item)? else {
                return Ok(false);
            };

            tx.execute(
                "DELETE FROM content WHERE item_id = ?1",
                params![record.id],
            )?;
            tx.execute(
                "UPDATE items
                 SET fetched_at = NULL, processed_at = NULL, published_at = NULL,
                     fetch_due_at = ?1, retry_count = 0
                 WHERE id = ?2",
                params![now.timestamp(), record.id],
            )?;
            Ok(true)
        })
    }
}
