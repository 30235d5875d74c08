//! Repository port for durable activity archive persistence.

use crate::archive::domain::{ActivityQuery, ActivityRecord, ActivityStatus};
use crate::queue::domain::{ComponentId, Page, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for archive repository operations.
pub type ArchiveRepositoryResult<T> = Result<T, ArchiveRepositoryError>;

/// Durable archive persistence contract.
///
/// Records enter through [`insert`] only. The insert maintains the
/// latest-outcome index: among rows sharing a latest-outcome key at most
/// one is flagged, and a flagged insert clears the flag on its
/// predecessors in the same storage transaction.
///
/// [`insert`]: ArchiveRepository::insert
#[async_trait]
pub trait ArchiveRepository: Send + Sync {
    /// Inserts a record, clearing the latest-outcome flags on prior rows
    /// that share either of its keys.
    ///
    /// Flag clearing and the insert are one transaction; a failure rolls
    /// back both. Records whose flags are unset (cancelled outcomes)
    /// leave prior rows untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveRepositoryError::DuplicateActivity`] when a record
    /// with the same identifier was already archived.
    async fn insert(&self, record: &ActivityRecord) -> ArchiveRepositoryResult<()>;

    /// Finds a record by identifier.
    async fn select_by_id(&self, id: TaskId) -> ArchiveRepositoryResult<Option<ActivityRecord>>;

    /// Lists records matching the query, newest first by execution time.
    async fn select_by_query(
        &self,
        query: &ActivityQuery,
        page: Page,
    ) -> ArchiveRepositoryResult<Vec<ActivityRecord>>;

    /// Counts records matching the query.
    async fn count_by_query(&self, query: &ActivityQuery) -> ArchiveRepositoryResult<u64>;

    /// Counts latest-outcome rows in `status` for one main component, or
    /// across all when `main_component` is `None`.
    async fn count_last_by_status_and_main_component(
        &self,
        status: ActivityStatus,
        main_component: Option<ComponentId>,
    ) -> ArchiveRepositoryResult<u64>;

    /// Returns identifiers of records that reached their terminal state
    /// strictly before `before`.
    async fn select_older_than(
        &self,
        before: DateTime<Utc>,
    ) -> ArchiveRepositoryResult<Vec<TaskId>>;

    /// Deletes the given records, ignoring identifiers that are already
    /// gone. Returns the number of rows deleted.
    async fn delete_by_ids(&self, ids: &[TaskId]) -> ArchiveRepositoryResult<u64>;
}

/// Errors surfaced by archive repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ArchiveRepositoryError {
    /// A record with the same identifier was already archived.
    #[error("duplicate activity identifier: {0}")]
    DuplicateActivity(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ArchiveRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for ArchiveRepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        // Diesel errors surfacing through transaction plumbing carry no
        // row identifiers, so they cannot become semantic variants here;
        // the insert maps unique violations at the statement itself.
        Self::persistence(err)
    }
}
