//! Statistics generation from the relay database
//!
//! This module provides functionality for extracting and displaying
//! pipeline statistics from the storage layer.

use crate::storage::{QueueDepths, StatName, Storage};
use crate::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Pipeline statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatistics {
    /// Monotonic counters keyed by name
    pub counters: BTreeMap<String, i64>,

    /// Pending work per stage and content row counts
    pub queue: QueueDepths,

    /// Creation time of the oldest upstream item seen
    pub oldest_seen: Option<DateTime<Utc>>,

    /// Creation time of the newest upstream item seen
    pub newest_seen: Option<DateTime<Utc>>,

    /// When the statistics were taken
    pub generated_at: DateTime<Utc>,
}

impl RelayStatistics {
    pub fn counter(&self, stat: StatName) -> i64 {
        self.counters
            .get(stat.to_db_string())
            .copied()
            .unwrap_or(0)
    }
}

fn watermark(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    Utc.timestamp_opt(value, 0).single()
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `now` - Reference time for "due" counts
///
/// # Returns
///
/// * `Ok(RelayStatistics)` - Successfully loaded statistics
/// * `Err(RelayError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage, now: DateTime<Utc>) -> Result<RelayStatistics> {
    let mut counters = BTreeMap::new();
    let mut oldest_seen = None;
    let mut newest_seen = None;

    for stat in storage.load_stats()? {
        match stat.name {
            StatName::OldestSeen => oldest_seen = watermark(stat.value),
            StatName::NewestSeen => newest_seen = watermark(stat.value),
            name => {
                counters.insert(name.to_db_string().to_string(), stat.value);
            }
        }
    }

    Ok(RelayStatistics {
        counters,
        queue: storage.queue_depths(now)?,
        oldest_seen,
        newest_seen,
        generated_at: now,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RelayStatistics) {
    println!("=== Relay Statistics ===\n");

    println!("Counters:");
    for name in StatName::all().iter().filter(|s| !s.is_watermark()) {
        println!("  {:<18} {}", name.to_db_string(), stats.counter(*name));
    }
    println!();

    let queue = &stats.queue;
    println!("Queue:");
    println!("  Items stored:      {}", queue.total_items);
    println!(
        "  To fetch:          {} ({} due now, {} retrying)",
        queue.to_fetch, queue.due_for_fetch, queue.retrying
    );
    println!("  To process:        {}", queue.to_process);
    println!("  To publish:        {}", queue.to_publish);
    println!("  Published:         {}", queue.published);
    println!();

    println!("Content:");
    println!("  Raw payloads:      {}", queue.raw_payloads);
    println!("  Formatted texts:   {}", queue.formatted_texts);
    println!();

    let format_time = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!("Upstream window:");
    println!("  Oldest seen:       {}", format_time(stats.oldest_seen));
    println!("  Newest seen:       {}", format_time(stats.newest_seen));

    let discovered = stats.counter(StatName::TotalDiscovered);
    let published = stats.counter(StatName::Published);
    let rate = if discovered > 0 {
        (published as f64 / discovered as f64) * 100.0
    } else {
        0.0
    };
    println!();
    println!(
        "Publish Rate: {:.1}% ({} / {} discovered items published)",
        rate, published, discovered
    );
}
