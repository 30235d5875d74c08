//! Service layer restoring queue consistency after worker failures.

use crate::queue::{
    domain::{QueuedTask, WorkerId},
    ports::{QueueRepository, QueueRepositoryResult},
};
use chrono::Duration;
use mockable::Clock;
use std::{collections::HashSet, sync::Arc};
use tracing::{info, warn};

/// Requeues tasks orphaned by dead workers and surfaces stale claims.
#[derive(Clone)]
pub struct LivenessReconciler<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> LivenessReconciler<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Requeues every in-progress task held by a worker outside `known`.
    ///
    /// Passing an empty set requeues all in-progress tasks. That is the
    /// full restart sweep: after a crash no claim can be trusted, so every
    /// claimed task goes back to pending with its creation timestamp
    /// intact. Returns the number of tasks reset.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn reset_tasks_with_unknown_workers(
        &self,
        known: &HashSet<WorkerId>,
    ) -> QueueRepositoryResult<u64> {
        let reset = self
            .repository
            .reset_tasks_with_unknown_workers(known, self.clock.utc())
            .await?;
        if reset > 0 {
            info!(reset, known_workers = known.len(), "requeued orphaned tasks");
        }
        Ok(reset)
    }

    /// Returns in-progress tasks claimed longer ago than `staleness`.
    ///
    /// The cutoff comparison is strict, so a task claimed exactly at the
    /// boundary is not reported. Callers decide whether a stale claim
    /// means a wedged worker or a legitimately long run.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn select_wornout(
        &self,
        staleness: Duration,
    ) -> QueueRepositoryResult<Vec<QueuedTask>> {
        let before = self.clock.utc() - staleness;
        let wornout = self
            .repository
            .select_in_progress_started_before(before)
            .await?;
        if !wornout.is_empty() {
            warn!(count = wornout.len(), "found stale in-progress tasks");
        }
        Ok(wornout)
    }
}
