//! Repository port for durable queue persistence.

use crate::queue::domain::{
    BranchWorkload, EligibleTask, EntityId, Page, QueuedTask, TaskCharacteristic, TaskId,
    TaskQuery, TaskStatus, TaskTransition, TaskType, WorkerId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for queue repository operations.
pub type QueueRepositoryResult<T> = Result<T, QueueRepositoryError>;

/// Durable queue persistence contract.
///
/// The store is the sole concurrency-control mechanism: every mutation
/// that may race is expressed as a conditional write whose affected-row
/// count decides the outcome. A lost [`compare_and_swap`] is a normal
/// result, not an error.
///
/// [`compare_and_swap`]: QueueRepository::compare_and_swap
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Appends a new queue row exactly as given.
    ///
    /// # Errors
    ///
    /// Returns [`QueueRepositoryError::DuplicateTask`] when the identifier
    /// already exists.
    async fn insert(&self, task: &QueuedTask) -> QueueRepositoryResult<()>;

    /// Attaches characteristics to their owning tasks.
    async fn insert_characteristics(
        &self,
        characteristics: &[TaskCharacteristic],
    ) -> QueueRepositoryResult<()>;

    /// Finds a task by identifier.
    async fn select_by_id(&self, id: TaskId) -> QueueRepositoryResult<Option<QueuedTask>>;

    /// Returns the characteristics attached to a task.
    async fn select_characteristics(
        &self,
        task_id: TaskId,
    ) -> QueueRepositoryResult<Vec<TaskCharacteristic>>;

    /// Returns all tasks of an entity, oldest first.
    async fn select_by_entity(&self, entity: EntityId) -> QueueRepositoryResult<Vec<QueuedTask>>;

    /// Returns the whole queue, oldest first.
    async fn select_all_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueuedTask>>;

    /// Returns every pending task, oldest first.
    async fn select_pending_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueuedTask>>;

    /// Deletes a task row and its characteristics.
    ///
    /// When `expected_status` is given the delete is conditional, so a
    /// caller cancelling a pending task cannot destroy one a worker has
    /// just claimed. Returns the number of rows deleted (zero or one).
    async fn delete_by_id(
        &self,
        id: TaskId,
        expected_status: Option<TaskStatus>,
    ) -> QueueRepositoryResult<u64>;

    /// Picks the oldest claimable pending task.
    ///
    /// A task is claimable when its subject has no in-progress task and
    /// its type is not in `excluded`. Candidates are ordered by creation
    /// timestamp, tie-broken by identifier. Subject-less tasks are always
    /// claimable. Read-only; the race with a concurrent claim is resolved
    /// by [`compare_and_swap`](Self::compare_and_swap) failing closed.
    async fn select_eligible_for_claim(
        &self,
        excluded: &[TaskType],
    ) -> QueueRepositoryResult<Option<EligibleTask>>;

    /// Applies a conditional status update atomically.
    ///
    /// Returns the updated row when exactly one row matched the expected
    /// status, `None` when the task was concurrently claimed, requeued, or
    /// removed.
    async fn compare_and_swap(
        &self,
        id: TaskId,
        transition: &TaskTransition,
    ) -> QueueRepositoryResult<Option<QueuedTask>>;

    /// Requeues every in-progress task whose worker is not in `known`,
    /// clearing ownership fields and preserving creation timestamps.
    ///
    /// An empty set requeues all in-progress tasks, which is the full
    /// restart sweep. Returns the number of tasks reset.
    async fn reset_tasks_with_unknown_workers(
        &self,
        known: &HashSet<WorkerId>,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64>;

    /// Returns in-progress tasks claimed strictly before `before`.
    async fn select_in_progress_started_before(
        &self,
        before: DateTime<Utc>,
    ) -> QueueRepositoryResult<Vec<QueuedTask>>;

    /// Returns the oldest pending analysis tasks (at most 100) with their
    /// branch kind.
    async fn select_oldest_pending_branch_workloads(
        &self,
    ) -> QueueRepositoryResult<Vec<BranchWorkload>>;

    /// Returns in-progress analysis tasks with their branch kind.
    async fn select_in_progress_with_characteristics(
        &self,
    ) -> QueueRepositoryResult<Vec<BranchWorkload>>;

    /// Lists tasks matching the query, newest first.
    async fn select_by_query(
        &self,
        query: &TaskQuery,
        page: Page,
    ) -> QueueRepositoryResult<Vec<QueuedTask>>;

    /// Counts tasks matching the query.
    async fn count_by_query(&self, query: &TaskQuery) -> QueueRepositoryResult<u64>;

    /// Counts tasks in the given status.
    async fn count_by_status(&self, status: TaskStatus) -> QueueRepositoryResult<u64>;

    /// Counts tasks of one entity in the given status.
    async fn count_by_status_and_entity(
        &self,
        status: TaskStatus,
        entity: EntityId,
    ) -> QueueRepositoryResult<u64>;
}

/// Errors returned by queue repository implementations.
#[derive(Debug, Clone, Error)]
pub enum QueueRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueueRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for QueueRepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        // Diesel errors surfacing through transaction plumbing carry no
        // row identifiers, so they cannot become semantic variants here;
        // adapters map unique violations at the statement that caused them.
        Self::persistence(err)
    }
}
