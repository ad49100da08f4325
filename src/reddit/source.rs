//! Subreddit polling source for the discover stage

use crate::pipeline::{Candidate, ItemSource};
use crate::reddit::types::{Listing, Submission};
use crate::reddit::RedditClient;
use crate::Result;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How many submission ids are remembered between polls
pub const SEEN_CAPACITY: usize = 1000;

const LISTING_LIMIT: &str = "100";

/// Bounded set of recently seen ids; the oldest id is forgotten first
#[derive(Debug, Clone)]
pub struct SeenSet {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records `id`, returning false if it was already present
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct PollState {
    primed: bool,
    seen: SeenSet,
}

/// Polls `/r/{a+b+c}/new` for link submissions
pub struct SubredditSource {
    client: Arc<RedditClient>,
    path: String,
    skip_existing: bool,
    state: Mutex<PollState>,
}

impl SubredditSource {
    pub fn new(client: Arc<RedditClient>, subreddits: &[String], skip_existing: bool) -> Self {
        Self {
            client,
            path: format!("r/{}/new", subreddits.join("+")),
            skip_existing,
            state: Mutex::new(PollState {
                primed: false,
                seen: SeenSet::new(SEEN_CAPACITY),
            }),
        }
    }
}

#[async_trait]
impl ItemSource for SubredditSource {
    async fn poll(&self) -> Result<Vec<Candidate>> {
        let listing: Listing<Submission> = self
            .client
            .get_json(&self.path, &[("limit", LISTING_LIMIT), ("raw_json", "1")])
            .await?;

        let mut state = self.state.lock().await;
        let priming = self.skip_existing && !state.primed;
        state.primed = true;

        let mut candidates = Vec::new();
        let mut ignored = 0usize;
        // Listings are newest first
        for thing in listing.data.children.into_iter().rev() {
            let post = thing.data;
            if !state.seen.insert(&post.name) || priming {
                continue;
            }
            match post.into_candidate() {
                Some(candidate) => candidates.push(candidate),
                None => ignored += 1,
            }
        }

        if priming {
            info!(existing = state.seen.len(), "Skipped submissions present at startup");
        } else {
            debug!(new = candidates.len(), ignored, "Polled subreddits");
        }
        Ok(candidates)
    }
}
