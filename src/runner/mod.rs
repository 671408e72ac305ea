//! Bounded-concurrency executor for machine operations.
//!
//! The runner accepts a dynamically growing set of operations and runs
//! them in parallel under a semaphore-bounded worker limit. Every
//! queued operation produces exactly one report; a failing operation
//! never cancels or blocks its siblings. Reports come back in
//! completion order — callers needing submission order can correlate by
//! label.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::debug;

use crate::ops::{OpError, OpKind, OpOutput, Operation};

/// Default worker limit for queued operations.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Outcome of one queued operation.
#[derive(Debug)]
pub struct OpReport {
    /// Label the operation was queued with.
    pub label: String,
    /// Kind of operation.
    pub kind: OpKind,
    /// Success value or the captured error.
    pub outcome: Result<OpOutput, OpError>,
}

impl OpReport {
    /// Returns `true` when the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Executes queued operations with bounded parallelism.
pub struct Runner {
    permits: Arc<Semaphore>,
    tasks: JoinSet<OpReport>,
    queued: HashMap<Id, (String, OpKind)>,
}

impl Runner {
    /// Creates a runner with the given worker limit (minimum one).
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(parallelism.max(1))),
            tasks: JoinSet::new(),
            queued: HashMap::new(),
        }
    }

    /// Queues an operation for execution.
    ///
    /// The operation starts as soon as a worker permit is free. Its
    /// eventual report is retrieved through [`Runner::next_result`] or
    /// [`Runner::drain`].
    pub fn queue_op<O: Operation>(&mut self, op: O) {
        let permits = Arc::clone(&self.permits);
        let label = op.label();
        let kind = op.kind();
        let task_label = label.clone();
        let handle = self.tasks.spawn(async move {
            // The semaphore is never closed, so acquisition only fails
            // on shutdown; report it rather than panic.
            let Ok(_permit) = permits.acquire_owned().await else {
                return OpReport {
                    label: task_label,
                    kind,
                    outcome: Err(OpError::Aborted(String::from("worker pool closed"))),
                };
            };
            debug!(op = %task_label, "operation started");
            let outcome = op.run().await;
            OpReport {
                label: task_label,
                kind,
                outcome,
            }
        });
        self.queued.insert(handle.id(), (label, kind));
    }

    /// Returns the number of operations still in flight or queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` when no operations are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for the next operation to finish and returns its report.
    ///
    /// Returns `None` once every queued operation has been reported. A
    /// panicked operation is reported as a failed operation, never
    /// propagated.
    pub async fn next_result(&mut self) -> Option<OpReport> {
        match self.tasks.join_next_with_id().await? {
            Ok((id, report)) => {
                self.queued.remove(&id);
                Some(report)
            }
            Err(join_err) => {
                let (label, kind) = self
                    .queued
                    .remove(&join_err.id())
                    .unwrap_or_else(|| (String::from("unknown"), OpKind::Add));
                Some(OpReport {
                    label,
                    kind,
                    outcome: Err(OpError::Aborted(join_err.to_string())),
                })
            }
        }
    }

    /// Runs every outstanding operation to completion and returns all
    /// reports in completion order.
    pub async fn drain(mut self) -> Vec<OpReport> {
        let mut reports = Vec::with_capacity(self.len());
        while let Some(report) = self.next_result().await {
            reports.push(report);
        }
        reports
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLELISM)
    }
}

#[cfg(test)]
mod tests;
