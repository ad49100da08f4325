//! Publish stage: posts formatted text as a chain of replies
//!
//! Text longer than the transport's limit is split into chunks. The first
//! chunk is posted as a reply to the item itself; each following chunk
//! replies to the previous one, so readers can follow the thread.

use crate::config::PublishConfig;
use crate::pipeline::traits::{Publisher, ReplyHandle};
use crate::pipeline::with_storage;
use crate::pipeline::worker::Stage;
use crate::storage::{PublishLease, Storage};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Appended to every chunk except the last
pub const CONTINUATION_MARKER: &str = "\n> ***(continues in next comment)***";

/// Splits `text` into chunks of at most `max_length` bytes
///
/// Each split happens at the last newline before the limit, else the last
/// space, else a hard cut. Non-final chunks end with the continuation
/// marker.
pub fn split_text(text: &str, max_length: usize) -> Vec<String> {
    let budget = max_length.saturating_sub(CONTINUATION_MARKER.len()).max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > max_length {
        let window = &rest[..floor_char_boundary(rest, budget)];
        let split_at = window
            .rfind('\n')
            .filter(|&i| i > 0)
            .or_else(|| window.rfind(' ').filter(|&i| i > 0))
            .unwrap_or(window.len());

        let (head, tail) = rest.split_at(split_at);
        chunks.push(format!("{}{}", head.trim(), CONTINUATION_MARKER));
        rest = tail.trim();
    }

    chunks.push(rest.to_string());
    chunks
}

/// Largest char boundary at or below `index`, never zero for non-empty text
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    if i == 0 {
        s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len())
    } else {
        i
    }
}

/// Publish settings resolved from configuration
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub max_length: usize,
    pub chunk_pause: Duration,
    /// Origins whose first reply gets highlighted (lower-cased)
    pub highlight_origins: HashSet<String>,
    /// Origins whose last chunk gets the coverage trailer (lower-cased)
    pub coverage_origins: HashSet<String>,
    pub coverage_trailer: String,
}

impl PublishSettings {
    pub fn new(config: &PublishConfig, distinguishable: &[String]) -> Self {
        Self {
            max_length: config.max_length,
            chunk_pause: config.chunk_pause(),
            highlight_origins: lower_set(distinguishable),
            coverage_origins: lower_set(&config.coverage),
            coverage_trailer: config.coverage_trailer.clone(),
        }
    }

    fn highlights(&self, origin: &str) -> bool {
        self.highlight_origins.contains(&origin.to_lowercase())
    }

    fn trailer_for(&self, origin: &str) -> Option<String> {
        if self.coverage_trailer.is_empty()
            || !self.coverage_origins.contains(&origin.to_lowercase())
        {
            return None;
        }
        Some(format!("\n\n{}", self.coverage_trailer))
    }

    /// Chunks for one item, with the coverage trailer on the last chunk
    pub fn chunks_for(&self, origin: &str, text: &str) -> Vec<String> {
        match self.trailer_for(origin) {
            Some(trailer) => {
                let limit = self.max_length.saturating_sub(trailer.len());
                let mut chunks = split_text(text, limit);
                if let Some(last) = chunks.last_mut() {
                    last.push_str(&trailer);
                }
                chunks
            }
            None => split_text(text, self.max_length),
        }
    }
}

fn lower_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

pub struct PublishStage {
    storage: Arc<dyn Storage>,
    publisher: Arc<dyn Publisher>,
    settings: PublishSettings,
    batch_size: u32,
}

impl PublishStage {
    pub fn new(
        storage: Arc<dyn Storage>,
        publisher: Arc<dyn Publisher>,
        settings: PublishSettings,
        batch_size: u32,
    ) -> Self {
        Self {
            storage,
            publisher,
            settings,
            batch_size,
        }
    }

    async fn publish_one(&self, lease: PublishLease) -> Result<()> {
        let PublishLease {
            item_id,
            external_id,
            origin,
            formatted_text,
        } = lease;

        let chunks = self.settings.chunks_for(&origin, &formatted_text);
        info!(item_id, external_id = %external_id, origin = %origin, chunks = chunks.len(), "Publishing item");

        let mut chunks = chunks.into_iter();
        let first = chunks.next().unwrap_or_default();
        let mut previous: ReplyHandle = self.publisher.post_reply(&external_id, &first).await?;

        if self.settings.highlights(&origin) {
            match self.publisher.highlight(&previous).await {
                Ok(()) => info!(item_id, reply = %previous, "Highlighted first reply"),
                Err(e) => warn!(item_id, reply = %previous, error = %e, "Failed to highlight reply"),
            }
        }

        for chunk in chunks {
            tokio::time::sleep(self.settings.chunk_pause).await;
            previous = self.publisher.reply_to_reply(&previous, &chunk).await?;
        }

        let marked =
            with_storage(&self.storage, move |storage| storage.complete_publish(item_id, Utc::now()))
                .await?;
        if !marked {
            warn!(item_id, "Item changed while publishing");
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<()> {
        let batch_size = self.batch_size;
        let leases =
            with_storage(&self.storage, move |storage| storage.lease_for_publish(batch_size))
                .await?;
        if leases.is_empty() {
            return Ok(());
        }
        info!(count = leases.len(), "Items ready to publish");

        for lease in leases {
            if cancel.is_cancelled() {
                break;
            }
            let item_id = lease.item_id;
            if let Err(e) = self.publish_one(lease).await {
                error!(item_id, error = %e, "Failed to publish item");
            }
        }

        Ok(())
    }
}
