//! Service layer moving finished tasks from the queue into the archive.

use crate::archive::{
    domain::{ActivityOutcome, ActivityRecord},
    ports::{ArchiveRepository, ArchiveRepositoryError},
};
use crate::queue::{
    domain::{ComponentId, QueuedTask, TaskId, TaskStatus},
    ports::{QueueRepository, QueueRepositoryError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors for finalisation operations.
#[derive(Debug, Error)]
pub enum TaskFinalisationError {
    /// The task's queue status does not admit the requested outcome.
    #[error("task {id} in status {status} cannot be finalised with this outcome")]
    NotFinalisable {
        /// Task being finalised.
        id: TaskId,
        /// Queue status the task was in.
        status: TaskStatus,
    },
    /// Queue persistence failed.
    #[error(transparent)]
    Queue(#[from] QueueRepositoryError),
    /// Archive persistence failed.
    #[error(transparent)]
    Archive(#[from] ArchiveRepositoryError),
}

/// Result type for finalisation service operations.
pub type TaskFinalisationResult<T> = Result<T, TaskFinalisationError>;

/// Moves tasks out of the queue into their terminal archived state.
#[derive(Clone)]
pub struct TaskFinaliser<Q, A, C>
where
    Q: QueueRepository,
    A: ArchiveRepository,
    C: Clock + Send + Sync,
{
    queue: Arc<Q>,
    archive: Arc<A>,
    clock: Arc<C>,
}

impl<Q, A, C> TaskFinaliser<Q, A, C>
where
    Q: QueueRepository,
    A: ArchiveRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new finalisation service.
    #[must_use]
    pub const fn new(queue: Arc<Q>, archive: Arc<A>, clock: Arc<C>) -> Self {
        Self {
            queue,
            archive,
            clock,
        }
    }

    /// Archives the task's outcome and removes its queue row.
    ///
    /// Executed outcomes require the task to be in progress; cancelled
    /// outcomes require it to still be pending. The archive insert happens
    /// first: if it fails the queue row survives and the caller can retry,
    /// whereas a failure after the insert leaves a consistent archive and
    /// an orphaned queue row that the next retry removes.
    ///
    /// # Errors
    ///
    /// Returns [`TaskFinalisationError::NotFinalisable`] on a status
    /// mismatch and propagates repository failures, notably
    /// [`ArchiveRepositoryError::DuplicateActivity`] on a retried insert.
    pub async fn finalise(
        &self,
        task: &QueuedTask,
        main_component: Option<ComponentId>,
        outcome: ActivityOutcome,
    ) -> TaskFinalisationResult<ActivityRecord> {
        let required = match outcome {
            ActivityOutcome::Canceled => TaskStatus::Pending,
            ActivityOutcome::Success { .. } | ActivityOutcome::Failed { .. } => {
                TaskStatus::InProgress
            }
        };
        if task.status() != required {
            return Err(TaskFinalisationError::NotFinalisable {
                id: task.id(),
                status: task.status(),
            });
        }

        let record =
            ActivityRecord::from_finished_task(task, main_component, outcome, &*self.clock);
        self.archive.insert(&record).await?;
        self.queue.delete_by_id(task.id(), None).await?;
        info!(task = %task.id(), status = %record.status(), "task finalised");
        Ok(record)
    }

    /// Deletes archived records older than `before`.
    ///
    /// Selection and deletion are separate round-trips; records archived
    /// in between simply wait for the next purge. Returns the number of
    /// records deleted.
    ///
    /// # Errors
    ///
    /// Propagates archive repository failures.
    pub async fn purge_older_than(&self, before: DateTime<Utc>) -> TaskFinalisationResult<u64> {
        let ids = self.archive.select_older_than(before).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.archive.delete_by_ids(&ids).await?;
        if deleted < ids.len() as u64 {
            warn!(
                selected = ids.len(),
                deleted, "some records vanished before the purge deleted them"
            );
        }
        info!(deleted, "purged archived records");
        Ok(deleted)
    }
}
