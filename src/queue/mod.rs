//! Fetch retry policy
//!
//! A failed fetch pushes the item's next attempt out by a fixed delay. Once
//! the retry count passes the ceiling the item is evicted instead.
//!
//! | Failures so far | Outcome |
//! |-----------------|------------------------------------|
//! | 1..=max_retries | Rescheduled `delay` after the failure |
//! | > max_retries   | Item and content deleted |

use crate::config::FetchConfig;
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Duration, Utc};

/// Default pause before a failed fetch is attempted again
pub const DEFAULT_RETRY_DELAY_SECS: i64 = 600;

/// Default number of retries allowed before eviction
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Fixed-delay retry policy for the fetch stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::seconds(DEFAULT_RETRY_DELAY_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            delay: Duration::seconds(config.retry_delay_secs as i64),
            max_retries: config.max_retries,
        }
    }
}

impl RetryPolicy {
    /// When the next attempt becomes due after a failure at `now`
    pub fn next_attempt_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.delay
    }

    /// Returns true once the retry count has passed the ceiling
    pub fn should_evict(&self, retry_count: u32) -> bool {
        retry_count > self.max_retries
    }
}

/// What happened to an item after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureOutcome {
    /// Next attempt scheduled; `attempt` is the new retry count
    Rescheduled { attempt: u32, at: DateTime<Utc> },
    /// Retry ceiling exceeded, item deleted
    Evicted { attempt: u32 },
}

/// Records a failed fetch and applies the retry policy
pub fn handle_fetch_failure<S: Storage + ?Sized>(
    storage: &S,
    item_id: i64,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> StorageResult<FetchFailureOutcome> {
    let at = policy.next_attempt_at(now);
    let attempt = storage.schedule_retry(item_id, at)?;

    if policy.should_evict(attempt) {
        storage.evict(item_id, now)?;
        return Ok(FetchFailureOutcome::Evicted { attempt });
    }

    Ok(FetchFailureOutcome::Rescheduled { attempt, at })
}
