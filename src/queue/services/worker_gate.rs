//! Service layer through which workers claim and release tasks.

use crate::queue::{
    domain::{QueuedTask, TaskId, TaskTransition, TaskType, WorkerId},
    ports::{QueueRepository, QueueRepositoryResult},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::debug;

/// Gate through which workers claim and release queued tasks.
///
/// Excluded task types are fixed at construction so a worker pool can be
/// partitioned by capability without re-negotiating on every claim.
#[derive(Clone)]
pub struct WorkerGate<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    excluded: Vec<TaskType>,
}

impl<R, C> WorkerGate<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    /// Creates a gate that never hands out tasks of the `excluded` types.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>, excluded: Vec<TaskType>) -> Self {
        Self {
            repository,
            clock,
            excluded,
        }
    }

    /// Claims the oldest eligible pending task for `worker`.
    ///
    /// Selection and claim are separate steps, so a concurrent worker may
    /// win the conditional update first. A lost race is not an error; the
    /// gate re-selects until it either claims a task or finds the queue
    /// drained of eligible work.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn claim_next(&self, worker: WorkerId) -> QueueRepositoryResult<Option<QueuedTask>> {
        loop {
            let Some(candidate) = self
                .repository
                .select_eligible_for_claim(&self.excluded)
                .await?
            else {
                return Ok(None);
            };
            let transition = TaskTransition::claim(worker, self.clock.utc());
            match self
                .repository
                .compare_and_swap(candidate.id, &transition)
                .await?
            {
                Some(task) => {
                    debug!(task = %task.id(), worker = %worker, "task claimed");
                    return Ok(Some(task));
                }
                None => {
                    debug!(task = %candidate.id, "claim lost to concurrent update, re-selecting");
                }
            }
        }
    }

    /// Returns an in-progress task to the pending pool.
    ///
    /// Ownership fields are cleared and the creation timestamp preserved,
    /// so the task keeps its original queue position. Returns whether the
    /// task was actually requeued; `false` means it was no longer in
    /// progress.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn release(&self, id: TaskId) -> QueueRepositoryResult<bool> {
        let transition = TaskTransition::release(self.clock.utc());
        let requeued = self
            .repository
            .compare_and_swap(id, &transition)
            .await?
            .is_some();
        if requeued {
            debug!(task = %id, "task released back to pending");
        }
        Ok(requeued)
    }
}
