//! Item inspection and backward-only admin resets

use crate::storage::{ItemDetail, ItemListing, ItemRef, Storage};
use crate::Result;
use chrono::{DateTime, Utc};
use tracing::info;

/// Which part of an item's content to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentView {
    #[default]
    Summary,
    Raw,
    Formatted,
}

/// Admin operations that move an item to an earlier stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Back to "fetched": clears processed/published and the formatted text
    Processed,
    /// Back to "processed": clears published only
    ToProcessed,
    /// Back to "discovered": clears every stage and the content
    Item,
}

impl ResetKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Processed => "reset to fetched",
            Self::ToProcessed => "reset to processed",
            Self::Item => "reset to discovered",
        }
    }
}

/// Applies a reset, returning false if the item does not exist
pub fn apply_reset(
    storage: &dyn Storage,
    kind: ResetKind,
    item: &ItemRef,
    now: DateTime<Utc>,
) -> Result<bool> {
    let found = match kind {
        ResetKind::Processed => storage.reset_processed(item)?,
        ResetKind::ToProcessed => storage.reset_to_processed(item)?,
        ResetKind::Item => storage.reset_item(item, now)?,
    };
    if found {
        info!(item = %item, action = kind.describe(), "Item reset");
    }
    Ok(found)
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Prints one item with the requested content view
pub fn print_item(detail: &ItemDetail, view: ContentView) {
    match view {
        ContentView::Raw => {
            println!("{}", detail.raw_payload.as_deref().unwrap_or(""));
            return;
        }
        ContentView::Formatted => {
            println!("{}", detail.formatted_text.as_deref().unwrap_or(""));
            return;
        }
        ContentView::Summary => {}
    }

    let item = &detail.item;
    let stage = item
        .stage()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "inconsistent".to_string());

    println!("Item #{} ({})", item.id, item.external_id);
    println!("  Origin:        {}", item.origin);
    println!("  URL:           {}", item.url);
    println!("  Stage:         {}", stage);
    println!("  Created:       {}", format_time(Some(item.created_at)));
    println!("  Discovered:    {}", format_time(Some(item.discovered_at)));
    println!("  Fetch due:     {}", format_time(item.fetch_due_at));
    println!("  Fetched:       {}", format_time(item.fetched_at));
    println!("  Processed:     {}", format_time(item.processed_at));
    println!("  Published:     {}", format_time(item.published_at));
    println!("  Retries:       {}", item.retry_count);
    println!(
        "  Raw payload:   {}",
        detail
            .raw_payload
            .as_ref()
            .map(|r| format!("{} bytes", r.len()))
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Formatted:     {}",
        detail
            .formatted_text
            .as_ref()
            .map(|t| format!("{} bytes", t.len()))
            .unwrap_or_else(|| "-".to_string())
    );
}

/// Prints a listing table, newest first
pub fn print_listing(items: &[ItemListing]) {
    println!(
        "{:>6}  {:<12}  {:<16}  {:<10}  {:>3}  {:>3}  URL",
        "ID", "EXTERNAL", "ORIGIN", "STAGE", "RAW", "FMT"
    );
    for listing in items {
        let item = &listing.item;
        let stage = item.stage().map(|s| s.as_str()).unwrap_or("?");
        println!(
            "{:>6}  {:<12}  {:<16}  {:<10}  {:>3}  {:>3}  {}",
            item.id,
            item.external_id,
            item.origin,
            stage,
            if listing.has_raw_payload { "yes" } else { "no" },
            if listing.has_formatted_text { "yes" } else { "no" },
            item.url
        );
    }
}
