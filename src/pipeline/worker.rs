//! Periodic worker loop
//!
//! A `WorkerLoop` runs one stage cycle after another until its cancellation
//! token fires. Stop requests are observed between cycles (and while
//! sleeping); a cycle that has started always runs to completion.

use crate::config::LoopTiming;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

/// One unit of periodic work
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Runs one cycle
    ///
    /// Long cycles should check `cancel` between items and return early.
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<()>;
}

/// Whether a loop is still cycling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Drives a `Stage` on a fixed schedule
pub struct WorkerLoop {
    stage: Arc<dyn Stage>,
    timing: LoopTiming,
    cancel: CancellationToken,
}

impl WorkerLoop {
    pub fn new(stage: Arc<dyn Stage>, timing: LoopTiming, cancel: CancellationToken) -> Self {
        Self {
            stage,
            timing,
            cancel,
        }
    }

    pub fn state(&self) -> LoopState {
        if self.cancel.is_cancelled() {
            LoopState::Stopped
        } else {
            LoopState::Running
        }
    }

    /// Runs until cancelled, returning the number of cycles executed
    pub async fn run(self) -> u64 {
        let span = info_span!("worker", stage = self.stage.name());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> u64 {
        info!("Worker started");
        let mut cycles = 0u64;

        while self.state() == LoopState::Running {
            let pause = match self.stage.run_cycle(&self.cancel).await {
                Ok(()) => self.timing.interval,
                Err(e) => {
                    error!(error = %e, "Cycle failed");
                    self.timing.error_interval
                }
            };
            cycles += 1;

            debug!(pause_secs = pause.as_secs_f64(), "Sleeping until next cycle");
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(cycles, "Worker stopped");
        cycles
    }
}
