//! Read-side query values for the queue listing surface.

use super::{EntityId, TaskStatus, TaskType};
use chrono::{DateTime, Utc};

/// Pagination window for listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows returned.
    pub limit: u32,
    /// Rows skipped before the first returned one.
    pub offset: u32,
}

impl Page {
    /// First page with the given size.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(100)
    }
}

/// Filter set for queue listings; side-effect free.
///
/// An explicitly empty entity list matches nothing, so callers can pass a
/// resolved-but-empty permission scope without special-casing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    entities: Option<Vec<EntityId>>,
    statuses: Vec<TaskStatus>,
    task_type: Option<TaskType>,
    min_created_at: Option<DateTime<Utc>>,
}

impl TaskQuery {
    /// Creates an unfiltered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results to the given entities.
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<EntityId>) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Restricts results to the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: Vec<TaskStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Restricts results to one task type.
    #[must_use]
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    /// Restricts results to tasks submitted at or after the instant.
    #[must_use]
    pub const fn with_min_created_at(mut self, min: DateTime<Utc>) -> Self {
        self.min_created_at = Some(min);
        self
    }

    /// Returns the entity filter, when set.
    #[must_use]
    pub fn entities(&self) -> Option<&[EntityId]> {
        self.entities.as_deref()
    }

    /// Returns the status filter; empty means any status.
    #[must_use]
    pub fn statuses(&self) -> &[TaskStatus] {
        &self.statuses
    }

    /// Returns the task type filter, when set.
    #[must_use]
    pub const fn task_type(&self) -> Option<&TaskType> {
        self.task_type.as_ref()
    }

    /// Returns the minimum submission instant, when set.
    #[must_use]
    pub const fn min_created_at(&self) -> Option<DateTime<Utc>> {
        self.min_created_at
    }

    /// Whether the query can match no row at all.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        self.entities.as_ref().is_some_and(Vec::is_empty)
    }
}
