//! Fetch stage: downloads raw payloads for queued items

use crate::pipeline::traits::PageFetcher;
use crate::pipeline::with_storage;
use crate::pipeline::worker::Stage;
use crate::queue::{handle_fetch_failure, FetchFailureOutcome, RetryPolicy};
use crate::storage::{FetchLease, Storage};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct FetchStage {
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn PageFetcher>,
    policy: RetryPolicy,
    batch_size: u32,
}

impl FetchStage {
    pub fn new(
        storage: Arc<dyn Storage>,
        fetcher: Arc<dyn PageFetcher>,
        policy: RetryPolicy,
        batch_size: u32,
    ) -> Self {
        Self {
            storage,
            fetcher,
            policy,
            batch_size,
        }
    }

    async fn fetch_one(&self, lease: FetchLease) -> Result<()> {
        let FetchLease {
            item_id,
            url,
            retry_count,
        } = lease;
        info!(item_id, url = %url, retry_count, "Fetching article");

        match self.fetcher.fetch(&url).await {
            Ok(body) => {
                let stored = with_storage(&self.storage, move |storage| {
                    storage.complete_fetch(item_id, &body, Utc::now())
                })
                .await?;
                if !stored {
                    warn!(item_id, "Item changed while fetching; result discarded");
                }
            }
            Err(e) => {
                warn!(item_id, url = %url, error = %e, "Fetch failed");
                let policy = self.policy;
                let outcome = with_storage(&self.storage, move |storage| {
                    handle_fetch_failure(storage, item_id, &policy, Utc::now())
                })
                .await?;

                match outcome {
                    FetchFailureOutcome::Rescheduled { attempt, at } => {
                        info!(item_id, attempt, next_attempt = %at, "Fetch rescheduled");
                    }
                    FetchFailureOutcome::Evicted { attempt } => {
                        warn!(item_id, attempt, "Retries exhausted; item evicted");
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Stage for FetchStage {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<()> {
        let batch_size = self.batch_size;
        let leases = with_storage(&self.storage, move |storage| {
            storage.lease_for_fetch(Utc::now(), batch_size)
        })
        .await?;
        if leases.is_empty() {
            return Ok(());
        }
        info!(count = leases.len(), "Items ready to fetch");

        for lease in leases {
            if cancel.is_cancelled() {
                break;
            }
            let item_id = lease.item_id;
            if let Err(e) = self.fetch_one(lease).await {
                error!(item_id, error = %e, "Failed to record fetch result");
            }
        }

        Ok(())
    }
}
