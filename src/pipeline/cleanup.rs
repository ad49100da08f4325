//! Cleanup stage: purges expired and unprocessable items

use crate::pipeline::with_storage;
use crate::pipeline::worker::Stage;
use crate::storage::Storage;
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct CleanupStage {
    storage: Arc<dyn Storage>,
    max_age: Duration,
}

impl CleanupStage {
    pub fn new(storage: Arc<dyn Storage>, max_age: Duration) -> Self {
        Self { storage, max_age }
    }
}

#[async_trait]
impl Stage for CleanupStage {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn run_cycle(&self, _cancel: &CancellationToken) -> Result<()> {
        let max_age = self.max_age;
        let report =
            with_storage(&self.storage, move |storage| storage.purge_stale(Utc::now(), max_age))
                .await?;

        if report.total() == 0 {
            debug!("Nothing to clean up");
        } else {
            info!(
                expired = report.expired,
                dead_ends = report.dead_ends,
                "Purged stale items"
            );
        }
        Ok(())
    }
}
