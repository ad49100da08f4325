//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Article-Relay
//! database. Timestamps are stored as UTC unix seconds.

use crate::storage::StatName;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per discovered item
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    origin TEXT NOT NULL,
    url TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    discovered_at INTEGER NOT NULL,
    fetch_due_at INTEGER,
    fetched_at INTEGER,
    processed_at INTEGER,
    published_at INTEGER,
    retry_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_items_fetch_due ON items(fetch_due_at) WHERE fetched_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_items_published ON items(published_at);

-- At most one payload row per item
CREATE TABLE IF NOT EXISTS content (
    item_id INTEGER PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
    raw_payload TEXT,
    formatted_text TEXT
);

-- Observability counters
CREATE TABLE IF NOT EXISTS stats (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
"#;

/// Initializes the database schema and seeds every known counter
pub fn initialize_schema(conn: &rusqlite::Connection, now: i64) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;

    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO stats (name, value, updated_at) VALUES (?1, 0, ?2)")?;
    for stat in StatName::all() {
        stmt.execute(rusqlite::params![stat.to_db_string(), now])?;
    }

    Ok(())
}
