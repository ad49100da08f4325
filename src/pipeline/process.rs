//! Process stage: turns raw payloads into formatted text

use crate::pipeline::traits::Extractor;
use crate::pipeline::with_storage;
use crate::pipeline::worker::Stage;
use crate::storage::{ProcessLease, Storage};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct ProcessStage {
    storage: Arc<dyn Storage>,
    extractor: Arc<dyn Extractor>,
    signature: Arc<str>,
    batch_size: u32,
}

impl ProcessStage {
    pub fn new(
        storage: Arc<dyn Storage>,
        extractor: Arc<dyn Extractor>,
        signature: &str,
        batch_size: u32,
    ) -> Self {
        Self {
            storage,
            extractor,
            signature: Arc::from(signature),
            batch_size,
        }
    }

    async fn process_one(&self, lease: ProcessLease) -> Result<()> {
        let ProcessLease {
            item_id,
            url,
            raw_payload,
        } = lease;

        let extractor = Arc::clone(&self.extractor);
        let signature = Arc::clone(&self.signature);
        let formatted = tokio::task::spawn_blocking(move || {
            extractor.extract(&raw_payload, &signature, Some(url.as_str()))
        })
        .await?;

        match formatted {
            Some(text) => {
                let length = text.len();
                let stored = with_storage(&self.storage, move |storage| {
                    storage.complete_process(item_id, &text, Utc::now())
                })
                .await?;
                if stored {
                    info!(item_id, length, "Processed item");
                } else {
                    warn!(item_id, "Item changed while processing; result discarded");
                }
            }
            None => {
                with_storage(&self.storage, move |storage| storage.evict(item_id, Utc::now()))
                    .await?;
                info!(item_id, "No extractable text; item evicted");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Stage for ProcessStage {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<()> {
        let batch_size = self.batch_size;
        let leases =
            with_storage(&self.storage, move |storage| storage.lease_for_process(batch_size))
                .await?;
        if leases.is_empty() {
            return Ok(());
        }
        info!(count = leases.len(), "Items ready to process");

        for lease in leases {
            if cancel.is_cancelled() {
                break;
            }
            let item_id = lease.item_id;
            if let Err(e) = self.process_one(lease).await {
                error!(item_id, error = %e, "Failed to process item");
            }
        }

        Ok(())
    }
}
