//! Discover stage: admits upstream candidates into the queue

use crate::filter::AdmissionFilter;
use crate::pipeline::traits::{Candidate, ItemSource};
use crate::pipeline::with_storage;
use crate::pipeline::worker::Stage;
use crate::storage::{NewItem, Storage};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Why a candidate was or was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    Duplicate,
    Banned,
    Stale,
}

/// Per-cycle tallies
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverReport {
    pub inserted: u32,
    pub duplicates: u32,
    pub skipped: u32,
    pub errors: u32,
}

pub struct DiscoverStage {
    storage: Arc<dyn Storage>,
    source: Arc<dyn ItemSource>,
    filter: Arc<AdmissionFilter>,
    max_age: Duration,
}

impl DiscoverStage {
    pub fn new(
        storage: Arc<dyn Storage>,
        source: Arc<dyn ItemSource>,
        filter: Arc<AdmissionFilter>,
        max_age: Duration,
    ) -> Self {
        Self {
            storage,
            source,
            filter,
            max_age,
        }
    }

    /// Applies the admission filter and freshness check, then inserts
    pub async fn admit(&self, candidate: Candidate, now: DateTime<Utc>) -> Result<Admission> {
        let rejection = if self.filter.is_banned(&candidate.url) {
            Some(Admission::Banned)
        } else if candidate.created_at < now - self.max_age {
            Some(Admission::Stale)
        } else {
            None
        };

        if let Some(rejection) = rejection {
            debug!(
                external_id = %candidate.external_id,
                url = %candidate.url,
                reason = ?rejection,
                "Skipping candidate"
            );
            with_storage(&self.storage, move |storage| storage.record_skipped(now)).await?;
            return Ok(rejection);
        }

        let item = NewItem::from(candidate);
        let inserted =
            with_storage(&self.storage, move |storage| storage.insert_if_absent(&item, now))
                .await?;

        Ok(if inserted {
            Admission::Inserted
        } else {
            Admission::Duplicate
        })
    }

    /// Admits every candidate, stopping early on cancellation
    pub async fn discover(
        &self,
        candidates: Vec<Candidate>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> DiscoverReport {
        let mut report = DiscoverReport::default();

        for candidate in candidates {
            if cancel.is_cancelled() {
                break;
            }

            let external_id = candidate.external_id.clone();
            match self.admit(candidate, now).await {
                Ok(Admission::Inserted) => {
                    info!(external_id = %external_id, "Queued new item");
                    report.inserted += 1;
                }
                Ok(Admission::Duplicate) => report.duplicates += 1,
                Ok(Admission::Banned | Admission::Stale) => report.skipped += 1,
                Err(e) => {
                    error!(external_id = %external_id, error = %e, "Failed to admit candidate");
                    report.errors += 1;
                }
            }
        }

        report
    }
}

#[async_trait]
impl Stage for DiscoverStage {
    fn name(&self) -> &'static str {
        "discover"
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<()> {
        let candidates = self.source.poll().await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let total = candidates.len();
        let report = self.discover(candidates, Utc::now(), cancel).await;
        info!(
            candidates = total,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            errors = report.errors,
            "Discover cycle finished"
        );
        Ok(())
    }
}
