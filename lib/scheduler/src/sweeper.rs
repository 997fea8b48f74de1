//! Periodic sweep over timer-parked executions and stale pending inputs.
//!
//! A sweep is cheap and idempotent: due executions are merely enqueued
//! (the engine claims each timer conditionally, so overlapping sweeps
//! resume an execution at most once), and expiry is a conditional status
//! transition. Sweep errors are logged and never stop the loop.

use chrono::{DateTime, Utc};
use leadflow_engine::pending::PendingInputManager;
use leadflow_engine::queue::ExecutionQueue;
use leadflow_engine::store::ExecutionStore;
use std::sync::Arc;
use std::time::Duration;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due executions handed to the queue.
    pub timers_enqueued: usize,
    /// Executions failed with `input_timeout`.
    pub inputs_expired: usize,
}

/// Resumes due Wait timers and expires unanswered pending inputs.
#[derive(Clone)]
pub struct Sweeper {
    store: Arc<dyn ExecutionStore>,
    queue: Arc<dyn ExecutionQueue>,
    pending: PendingInputManager,
}

impl Sweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        queue: Arc<dyn ExecutionQueue>,
        pending: PendingInputManager,
    ) -> Self {
        Self {
            store,
            queue,
            pending,
        }
    }

    /// Runs one sweep at the given instant.
    pub async fn run_once(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        match self.store.list_due_executions(now).await {
            Ok(due) => {
                for execution_id in due {
                    match self.queue.enqueue(execution_id).await {
                        Ok(()) => report.timers_enqueued += 1,
                        Err(e) => {
                            tracing::warn!(
                                execution_id = %execution_id,
                                error = %e,
                                "failed to enqueue due execution"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to list due executions");
            }
        }

        match self.pending.expire_pending(now).await {
            Ok(expired) => report.inputs_expired = expired,
            Err(e) => {
                tracing::warn!(error = %e, "failed to expire pending inputs");
            }
        }

        if report.timers_enqueued > 0 || report.inputs_expired > 0 {
            tracing::debug!(
                timers_enqueued = report.timers_enqueued,
                inputs_expired = report.inputs_expired,
                "sweep finished"
            );
        }

        report
    }

    /// Spawns the sweep loop on the given interval.
    #[must_use]
    pub fn spawn(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }
}
