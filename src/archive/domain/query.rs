//! Read-side query values for the activity listing surface.

use super::ActivityStatus;
use crate::queue::domain::{ComponentId, TaskType};
use chrono::{DateTime, Utc};

/// Filter set for activity listings; side-effect free.
///
/// An explicitly empty main-component list matches nothing, mirroring the
/// queue listing contract for resolved-but-empty permission scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    main_components: Option<Vec<ComponentId>>,
    component: Option<ComponentId>,
    statuses: Vec<ActivityStatus>,
    task_type: Option<TaskType>,
    only_latest: bool,
    min_submitted_at: Option<DateTime<Utc>>,
    max_executed_at: Option<DateTime<Utc>>,
}

impl ActivityQuery {
    /// Empty query matching every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to records whose main component is in the list.
    #[must_use]
    pub fn with_main_components(mut self, main_components: Vec<ComponentId>) -> Self {
        self.main_components = Some(main_components);
        self
    }

    /// Restricts to records of one component.
    #[must_use]
    pub const fn with_component(mut self, component: ComponentId) -> Self {
        self.component = Some(component);
        self
    }

    /// Restricts to records in any of the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: Vec<ActivityStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Restricts to records of one task type.
    #[must_use]
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    /// Restricts to rows holding the latest outcome for their key.
    #[must_use]
    pub const fn only_latest(mut self) -> Self {
        self.only_latest = true;
        self
    }

    /// Restricts to records submitted at or after the given instant.
    #[must_use]
    pub const fn with_min_submitted_at(mut self, min: DateTime<Utc>) -> Self {
        self.min_submitted_at = Some(min);
        self
    }

    /// Restricts to records executed at or before the given instant.
    #[must_use]
    pub const fn with_max_executed_at(mut self, max: DateTime<Utc>) -> Self {
        self.max_executed_at = Some(max);
        self
    }

    /// Main-component filter; `Some(&[])` matches nothing.
    #[must_use]
    pub fn main_components(&self) -> Option<&[ComponentId]> {
        self.main_components.as_deref()
    }

    /// Component filter, if set.
    #[must_use]
    pub const fn component(&self) -> Option<ComponentId> {
        self.component
    }

    /// Status filter; empty means all statuses.
    #[must_use]
    pub fn statuses(&self) -> &[ActivityStatus] {
        &self.statuses
    }

    /// Task type filter, if set.
    #[must_use]
    pub const fn task_type(&self) -> Option<&TaskType> {
        self.task_type.as_ref()
    }

    /// Whether only latest-outcome rows are returned.
    #[must_use]
    pub const fn is_only_latest(&self) -> bool {
        self.only_latest
    }

    /// Lower bound on submission time, if set.
    #[must_use]
    pub const fn min_submitted_at(&self) -> Option<DateTime<Utc>> {
        self.min_submitted_at
    }

    /// Upper bound on execution time, if set.
    #[must_use]
    pub const fn max_executed_at(&self) -> Option<DateTime<Utc>> {
        self.max_executed_at
    }

    /// True when the query can never match, per the empty-list contract.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        self.main_components
            .as_ref()
            .is_some_and(|components| components.is_empty())
    }
}
