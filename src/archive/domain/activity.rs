//! Immutable activity records, the terminal state of every task.

use super::error::{ArchiveDomainError, ParseActivityStatusError};
use crate::queue::domain::{ComponentId, QueuedTask, SubmitterId, TaskId, TaskType, WorkerId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of an archived task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// The task ran to completion.
    Success,
    /// The task ran and failed.
    Failed,
    /// The task was removed from the queue without running.
    Canceled,
}

impl ActivityStatus {
    /// Canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl TryFrom<&str> for ActivityStatus {
    type Error = ParseActivityStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(ParseActivityStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure details captured when a task execution fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Human-readable failure message.
    pub message: String,
    /// Machine-readable failure classifier, if the executor provided one.
    pub kind: Option<String>,
    /// Captured stacktrace, if any.
    pub stacktrace: Option<String>,
}

impl ExecutionError {
    /// Creates a failure with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            stacktrace: None,
        }
    }

    /// Attaches a failure classifier.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Attaches a captured stacktrace.
    #[must_use]
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }
}

/// How a task left the queue.
///
/// Being the only way to build an [`ActivityRecord`], the constructor
/// enum ties the error payload to the failed status and the warning count
/// to the successful one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// The task completed, possibly with analysis warnings.
    Success {
        /// Number of warnings raised during execution.
        warning_count: u32,
    },
    /// The task failed.
    Failed {
        /// Failure details.
        error: ExecutionError,
    },
    /// The task was cancelled before running.
    Canceled,
}

impl ActivityOutcome {
    const fn status(&self) -> ActivityStatus {
        match self {
            Self::Success { .. } => ActivityStatus::Success,
            Self::Failed { .. } => ActivityStatus::Failed,
            Self::Canceled => ActivityStatus::Canceled,
        }
    }
}

/// Parameter object for reconstructing a persisted activity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedActivityData {
    /// Identifier the record inherited from its queue row.
    pub id: TaskId,
    /// Task type tag.
    pub task_type: TaskType,
    /// Component the task worked on, if any.
    pub component: Option<ComponentId>,
    /// Root-branch component identity, if any.
    pub main_component: Option<ComponentId>,
    /// Terminal status.
    pub status: ActivityStatus,
    /// Whether this row holds the latest outcome for its component key.
    pub is_last: bool,
    /// Latest-outcome grouping key over the component.
    pub is_last_key: String,
    /// Whether this row holds the latest outcome for its main-component key.
    pub main_is_last: bool,
    /// Latest-outcome grouping key over the main component.
    pub main_is_last_key: String,
    /// Submitting principal, if known.
    pub submitter: Option<SubmitterId>,
    /// Worker that executed the task, if it ran.
    pub worker: Option<WorkerId>,
    /// When the task entered the queue.
    pub submitted_at: DateTime<Utc>,
    /// When a worker claimed the task, if it ran.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached its terminal state.
    pub executed_at: DateTime<Utc>,
    /// Wall-clock execution duration in milliseconds, if it ran.
    pub execution_time_ms: Option<i64>,
    /// Failure details, present exactly when the status is failed.
    pub error: Option<ExecutionError>,
    /// Number of warnings raised during execution.
    pub warning_count: u32,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest row mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Archived outcome of a finished task. Immutable once written, except
/// for the latest-outcome flags which a newer record may clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    id: TaskId,
    task_type: TaskType,
    component: Option<ComponentId>,
    main_component: Option<ComponentId>,
    status: ActivityStatus,
    is_last: bool,
    is_last_key: String,
    main_is_last: bool,
    main_is_last_key: String,
    submitter: Option<SubmitterId>,
    worker: Option<WorkerId>,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    executed_at: DateTime<Utc>,
    execution_time_ms: Option<i64>,
    error: Option<ExecutionError>,
    warning_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn latest_key(task_type: &TaskType, component: Option<ComponentId>) -> String {
    component.map_or_else(
        || task_type.as_str().to_owned(),
        |id| format!("{}{}", task_type.as_str(), id),
    )
}

impl ActivityRecord {
    /// Builds the archive record for a task leaving the queue.
    ///
    /// The executed-at timestamp is stamped from the clock; execution
    /// time is derived from the task's claim timestamp when it ran.
    /// Cancelled outcomes never claim the latest-outcome flags.
    #[must_use]
    pub fn from_finished_task(
        task: &QueuedTask,
        main_component: Option<ComponentId>,
        outcome: ActivityOutcome,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.utc();
        let status = outcome.status();
        let (warning_count, error) = match outcome {
            ActivityOutcome::Success { warning_count } => (warning_count, None),
            ActivityOutcome::Failed { error } => (0, Some(error)),
            ActivityOutcome::Canceled => (0, None),
        };
        let flagged = status != ActivityStatus::Canceled;
        Self {
            id: task.id(),
            task_type: task.task_type().clone(),
            component: task.component(),
            main_component,
            status,
            is_last: flagged,
            is_last_key: latest_key(task.task_type(), task.component()),
            main_is_last: flagged,
            main_is_last_key: latest_key(task.task_type(), main_component),
            submitter: task.submitter(),
            worker: task.worker(),
            submitted_at: task.created_at(),
            started_at: task.started_at(),
            executed_at: now,
            execution_time_ms: task.started_at().map(|s| (now - s).num_milliseconds()),
            error,
            warning_count,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a record from persisted storage, rejecting rows that
    /// violate the error-payload or latest-flag invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveDomainError::InconsistentErrorPayload`] or
    /// [`ArchiveDomainError::InconsistentLatestFlag`] for corrupt rows.
    pub fn from_persisted(data: PersistedActivityData) -> Result<Self, ArchiveDomainError> {
        let failed = data.status == ActivityStatus::Failed;
        if failed != data.error.is_some() {
            return Err(ArchiveDomainError::InconsistentErrorPayload(data.id));
        }
        if data.status == ActivityStatus::Canceled && (data.is_last || data.main_is_last) {
            return Err(ArchiveDomainError::InconsistentLatestFlag(data.id));
        }
        Ok(Self {
            id: data.id,
            task_type: data.task_type,
            component: data.component,
            main_component: data.main_component,
            status: data.status,
            is_last: data.is_last,
            is_last_key: data.is_last_key,
            main_is_last: data.main_is_last,
            main_is_last_key: data.main_is_last_key,
            submitter: data.submitter,
            worker: data.worker,
            submitted_at: data.submitted_at,
            started_at: data.started_at,
            executed_at: data.executed_at,
            execution_time_ms: data.execution_time_ms,
            error: data.error,
            warning_count: data.warning_count,
            created_at: data.created_at,
            updated_at: data.updated_at,
        })
    }

    /// Returns the record identifier, shared with the former queue row.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// Returns the component the task worked on, if any.
    #[must_use]
    pub const fn component(&self) -> Option<ComponentId> {
        self.component
    }

    /// Returns the root-branch component identity, if any.
    #[must_use]
    pub const fn main_component(&self) -> Option<ComponentId> {
        self.main_component
    }

    /// Returns the terminal status.
    #[must_use]
    pub const fn status(&self) -> ActivityStatus {
        self.status
    }

    /// Whether this row holds the latest outcome for its component key.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.is_last
    }

    /// Returns the latest-outcome grouping key over the component.
    #[must_use]
    pub fn is_last_key(&self) -> &str {
        &self.is_last_key
    }

    /// Whether this row holds the latest outcome for its main-component
    /// key.
    #[must_use]
    pub const fn main_is_last(&self) -> bool {
        self.main_is_last
    }

    /// Returns the latest-outcome grouping key over the main component.
    #[must_use]
    pub fn main_is_last_key(&self) -> &str {
        &self.main_is_last_key
    }

    /// Returns the submitting principal, if known.
    #[must_use]
    pub const fn submitter(&self) -> Option<SubmitterId> {
        self.submitter
    }

    /// Returns the worker that executed the task, if it ran.
    #[must_use]
    pub const fn worker(&self) -> Option<WorkerId> {
        self.worker
    }

    /// Returns when the task entered the queue.
    #[must_use]
    pub const fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Returns when a worker claimed the task, if it ran.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the task reached its terminal state.
    #[must_use]
    pub const fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    /// Returns the execution duration in milliseconds, if the task ran.
    #[must_use]
    pub const fn execution_time_ms(&self) -> Option<i64> {
        self.execution_time_ms
    }

    /// Returns the failure details, present exactly when failed.
    #[must_use]
    pub const fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Returns the number of warnings raised during execution.
    #[must_use]
    pub const fn warning_count(&self) -> u32 {
        self.warning_count
    }

    /// Returns the row creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest row mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
