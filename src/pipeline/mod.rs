//! Stage workers and their orchestration
//!
//! This module contains:
//! - The collaborator traits the stages depend on
//! - The periodic worker loop
//! - One stage per queue transition (discover, fetch, process, publish)
//!   plus cleanup
//!
//! Each stage runs as its own long-lived task. Stages never talk to each
//! other directly; the store is the only coordination point.

mod cleanup;
mod discover;
mod fetch;
mod process;
mod publish;
mod traits;
mod worker;

pub use cleanup::CleanupStage;
pub use discover::{Admission, DiscoverReport, DiscoverStage};
pub use fetch::FetchStage;
pub use process::ProcessStage;
pub use publish::{split_text, PublishSettings, PublishStage, CONTINUATION_MARKER};
pub use traits::{Candidate, Extractor, ItemSource, PageFetcher, Publisher, ReplyHandle};
pub use worker::{LoopState, Stage, WorkerLoop};

use crate::config::Config;
use crate::filter::AdmissionFilter;
use crate::queue::RetryPolicy;
use crate::storage::{Storage, StorageResult};
use crate::Result;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Runs a blocking store operation off the async executor
///
/// Store calls may wait on the write lock or on SQLite itself, so they run
/// on the blocking pool.
pub(crate) async fn with_storage<T, F>(storage: &Arc<dyn Storage>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Storage) -> StorageResult<T> + Send + 'static,
{
    let storage = Arc::clone(storage);
    let value = tokio::task::spawn_blocking(move || op(storage.as_ref())).await??;
    Ok(value)
}

/// External collaborators used by the stages
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ItemSource>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub publisher: Arc<dyn Publisher>,
}

/// Builds one worker loop per stage, all sharing `cancel`
pub fn build_workers(
    config: &Config,
    storage: Arc<dyn Storage>,
    collaborators: Collaborators,
    cancel: &CancellationToken,
) -> Vec<WorkerLoop> {
    let batch_size = config.storage.batch_size;
    let filter = Arc::new(AdmissionFilter::compile(&config.reddit.banned_domains));
    info!(rules = filter.rule_count(), "Admission filter compiled");

    let stages: Vec<(Arc<dyn Stage>, crate::config::LoopTiming)> = vec![
        (
            Arc::new(DiscoverStage::new(
                Arc::clone(&storage),
                collaborators.source,
                filter,
                config.discover.max_age(),
            )),
            config.discover.timing(),
        ),
        (
            Arc::new(FetchStage::new(
                Arc::clone(&storage),
                collaborators.fetcher,
                RetryPolicy::from(&config.fetch),
                batch_size,
            )),
            config.fetch.timing(),
        ),
        (
            Arc::new(ProcessStage::new(
                Arc::clone(&storage),
                collaborators.extractor,
                &config.process.signature,
                batch_size,
            )),
            config.process.timing(),
        ),
        (
            Arc::new(PublishStage::new(
                Arc::clone(&storage),
                collaborators.publisher,
                PublishSettings::new(&config.publish, &config.reddit.distinguishable),
                batch_size,
            )),
            config.publish.timing(),
        ),
        (
            Arc::new(CleanupStage::new(storage, config.cleanup.max_age())),
            config.cleanup.timing(),
        ),
    ];

    stages
        .into_iter()
        .map(|(stage, timing)| WorkerLoop::new(stage, timing, cancel.clone()))
        .collect()
}

/// Cancels `cancel` on SIGTERM or SIGINT
///
/// Handlers are registered before this returns, so a signal delivered
/// afterwards is never missed.
#[cfg(unix)]
pub fn cancel_on_shutdown_signal(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM; finishing in-flight cycles"),
            _ = sigint.recv() => info!("Received SIGINT; finishing in-flight cycles"),
            _ = cancel.cancelled() => return,
        }
        cancel.cancel();
    }))
}

/// Cancels `cancel` on Ctrl-C
#[cfg(not(unix))]
pub fn cancel_on_shutdown_signal(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl-C; finishing in-flight cycles"),
                    Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
                }
            }
            _ = cancel.cancelled() => return,
        }
        cancel.cancel();
    }))
}

/// Spawns every worker and waits until all of them have stopped
///
/// Workers stop once `cancel` fires and their current cycle has finished.
pub async fn run_pipeline(
    config: &Config,
    storage: Arc<dyn Storage>,
    collaborators: Collaborators,
    cancel: CancellationToken,
) -> Result<()> {
    let mut workers = JoinSet::new();
    for worker in build_workers(config, storage, collaborators, &cancel) {
        workers.spawn(worker.run());
    }
    info!(workers = workers.len(), "Pipeline started");

    let mut first_error = None;
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Worker task failed");
            cancel.cancel();
            first_error.get_or_insert(e);
        }
    }

    info!("Pipeline stopped");
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
