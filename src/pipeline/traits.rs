//! Collaborator interfaces used by the stage workers
//!
//! The workers only depend on these traits; the Reddit, HTTP and HTML
//! implementations live in their own modules and tests swap in fakes.

use crate::storage::NewItem;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// An upstream item offered to the Discover stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Upstream identifier, unique across the store
    pub external_id: String,
    /// Upstream channel the item came from (used as publish destination)
    pub origin: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for NewItem {
    fn from(candidate: Candidate) -> Self {
        Self {
            external_id: candidate.external_id,
            origin: candidate.origin,
            url: candidate.url,
            created_at: candidate.created_at,
        }
    }
}

/// Produces upstream candidates
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Returns candidates not offered before, oldest first
    async fn poll(&self) -> Result<Vec<Candidate>>;
}

/// Downloads the raw payload for a URL
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Turns a raw payload into publishable text
pub trait Extractor: Send + Sync {
    /// Returns `None` when the payload holds no usable text
    fn extract(&self, raw_payload: &str, signature: &str, source_url: Option<&str>)
        -> Option<String>;
}

/// Opaque handle to a posted reply
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyHandle(pub String);

impl std::fmt::Display for ReplyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Posts replies downstream
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Posts a top-level reply to the item identified by `destination`
    async fn post_reply(&self, destination: &str, text: &str) -> Result<ReplyHandle>;

    /// Posts a reply underneath an earlier reply
    async fn reply_to_reply(&self, parent: &ReplyHandle, text: &str) -> Result<ReplyHandle>;

    /// Highlights (pins) a reply
    async fn highlight(&self, reply: &ReplyHandle) -> Result<()>;
}
