//! Queued task aggregate and its lifecycle transitions.

use super::{
    ComponentId, EntityId, ParseTaskStatusError, QueueDomainError, SubmitterId, TaskId, WorkerId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue lifecycle status.
///
/// Terminal outcomes never appear here: finishing a task moves it out of
/// the queue and into the activity archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Exclusively owned by a worker.
    InProgress,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known task type tags.
pub mod task_types {
    /// Analysis report processing.
    pub const REPORT: &str = "REPORT";
    /// Background branch issue synchronisation.
    pub const BRANCH_ISSUE_SYNC: &str = "BRANCH_ISSUE_SYNC";
    /// Audit log retention purge.
    pub const AUDIT_PURGE: &str = "AUDIT_PURGE";
}

/// Validated task type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    const MAX_LEN: usize = 40;

    /// Creates a validated task type.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidTaskType`] when the tag is empty
    /// after trimming or longer than the schema allows.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LEN {
            return Err(QueueDomainError::InvalidTaskType(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the tag as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TaskType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The subject a task is serialised on.
///
/// At most one task per subject runs at a time. Tasks without a subject
/// never conflict with each other; global jobs such as index maintenance
/// rely on running alongside analysis work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskSubject {
    /// Serialised on the owning entity (project).
    Entity(EntityId),
    /// Serialised on the component when no entity is recorded.
    Component(ComponentId),
}

/// A task waiting in, or claimed from, the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTask {
    id: TaskId,
    task_type: TaskType,
    component: Option<ComponentId>,
    entity: Option<EntityId>,
    status: TaskStatus,
    submitter: Option<SubmitterId>,
    worker: Option<WorkerId>,
    started_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSubmission {
    /// Identifier for the new task.
    pub id: TaskId,
    /// Task type tag.
    pub task_type: TaskType,
    /// Component the task works on, if any.
    pub component: Option<ComponentId>,
    /// Entity grouping the component; set together with `component`.
    pub entity: Option<EntityId>,
    /// Submitting principal, if known.
    pub submitter: Option<SubmitterId>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted task type.
    pub task_type: TaskType,
    /// Persisted component, if any.
    pub component: Option<ComponentId>,
    /// Persisted entity, if any.
    pub entity: Option<EntityId>,
    /// Persisted queue status.
    pub status: TaskStatus,
    /// Persisted submitter, if any.
    pub submitter: Option<SubmitterId>,
    /// Persisted owning worker, set only while in progress.
    pub worker: Option<WorkerId>,
    /// Persisted claim timestamp, set only while in progress.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl QueuedTask {
    /// Creates a new pending task from a submission, stamping creation and
    /// update timestamps from the clock.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InconsistentSubjectKeys`] when only one
    /// of component/entity is given.
    pub fn new(submission: TaskSubmission, clock: &impl Clock) -> Result<Self, QueueDomainError> {
        validate_subject_keys(submission.component.as_ref(), submission.entity.as_ref())?;
        let timestamp = clock.utc();
        Ok(Self {
            id: submission.id,
            task_type: submission.task_type,
            component: submission.component,
            entity: submission.entity,
            status: TaskStatus::Pending,
            submitter: submission.submitter,
            worker: None,
            started_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage, rejecting rows that
    /// violate the subject-key or worker-ownership invariants.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InconsistentSubjectKeys`] or
    /// [`QueueDomainError::InconsistentOwnership`] for corrupt rows.
    pub fn from_persisted(data: PersistedTaskData) -> Result<Self, QueueDomainError> {
        validate_subject_keys(data.component.as_ref(), data.entity.as_ref())?;
        let owned = data.worker.is_some() && data.started_at.is_some();
        let unowned = data.worker.is_none() && data.started_at.is_none();
        let consistent = match data.status {
            TaskStatus::Pending => unowned,
            TaskStatus::InProgress => owned,
        };
        if !consistent {
            return Err(QueueDomainError::InconsistentOwnership(
                data.id,
                data.status.as_str(),
            ));
        }
        Ok(Self {
            id: data.id,
            task_type: data.task_type,
            component: data.component,
            entity: data.entity,
            status: data.status,
            submitter: data.submitter,
            worker: data.worker,
            started_at: data.started_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        })
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// Returns the component the task works on, if any.
    #[must_use]
    pub const fn component(&self) -> Option<ComponentId> {
        self.component
    }

    /// Returns the owning entity, if any.
    #[must_use]
    pub const fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Returns the queue status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the submitting principal, if known.
    #[must_use]
    pub const fn submitter(&self) -> Option<SubmitterId> {
        self.submitter
    }

    /// Returns the owning worker while in progress.
    #[must_use]
    pub const fn worker(&self) -> Option<WorkerId> {
        self.worker
    }

    /// Returns the claim timestamp while in progress.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the submission timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the serialisation subject: the entity when recorded, the
    /// component otherwise, `None` for subject-less tasks.
    #[must_use]
    pub const fn subject(&self) -> Option<TaskSubject> {
        match (self.entity, self.component) {
            (Some(entity), _) => Some(TaskSubject::Entity(entity)),
            (None, Some(component)) => Some(TaskSubject::Component(component)),
            (None, None) => None,
        }
    }
}

const fn validate_subject_keys(
    component: Option<&ComponentId>,
    entity: Option<&EntityId>,
) -> Result<(), QueueDomainError> {
    if component.is_some() == entity.is_some() {
        Ok(())
    } else {
        Err(QueueDomainError::InconsistentSubjectKeys)
    }
}

/// Immutable description of a conditional status update.
///
/// A transition succeeds only when the stored row still carries
/// `expected_status`; the store applies it as a single compare-and-swap
/// so that exactly one concurrent caller wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTransition {
    expected_status: TaskStatus,
    new_status: TaskStatus,
    worker: Option<WorkerId>,
    started_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TaskTransition {
    /// Transition handing a pending task to `worker` at `now`.
    #[must_use]
    pub const fn claim(worker: WorkerId, now: DateTime<Utc>) -> Self {
        Self {
            expected_status: TaskStatus::Pending,
            new_status: TaskStatus::InProgress,
            worker: Some(worker),
            started_at: Some(now),
            updated_at: now,
        }
    }

    /// Transition returning an in-progress task to the queue at `now`.
    ///
    /// Ownership fields are cleared; the creation timestamp is untouched so
    /// requeued work keeps its original place in the FIFO order.
    #[must_use]
    pub const fn release(now: DateTime<Utc>) -> Self {
        Self {
            expected_status: TaskStatus::InProgress,
            new_status: TaskStatus::Pending,
            worker: None,
            started_at: None,
            updated_at: now,
        }
    }

    /// Returns the status the stored row must still have.
    #[must_use]
    pub const fn expected_status(&self) -> TaskStatus {
        self.expected_status
    }

    /// Returns the status written on success.
    #[must_use]
    pub const fn new_status(&self) -> TaskStatus {
        self.new_status
    }

    /// Returns the worker written on success, if any.
    #[must_use]
    pub const fn worker(&self) -> Option<WorkerId> {
        self.worker
    }

    /// Returns the claim timestamp written on success, if any.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the update timestamp written on success.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the transition applies to the given task.
    #[must_use]
    pub fn matches(&self, task: &QueuedTask) -> bool {
        task.status == self.expected_status
    }

    /// Returns a copy of `task` with the transition applied.
    ///
    /// Callers must check [`Self::matches`] first; the in-memory adapter
    /// does both under one write guard to mirror the store's atomicity.
    #[must_use]
    pub fn apply(&self, task: &QueuedTask) -> QueuedTask {
        let mut updated = task.clone();
        updated.status = self.new_status;
        updated.worker = self.worker;
        updated.started_at = self.started_at;
        updated.updated_at = self.updated_at;
        updated
    }
}

/// Claimable candidate returned by the eligibility query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibleTask {
    /// Candidate task identifier.
    pub id: TaskId,
    /// Candidate submission timestamp, exposed for queue-latency metrics.
    pub created_at: DateTime<Utc>,
}
