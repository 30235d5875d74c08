//! Service layer for task submission and cooperative cancellation.

use crate::queue::{
    domain::{
        CharacteristicKey, ComponentId, EntityId, QueueDomainError, QueuedTask, SubmitterId,
        TaskCharacteristic, TaskId, TaskStatus, TaskSubmission, TaskType,
    },
    ports::{QueueRepository, QueueRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Request payload for submitting a task to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTaskRequest {
    id: Option<TaskId>,
    task_type: String,
    component: Option<ComponentId>,
    entity: Option<EntityId>,
    submitter: Option<SubmitterId>,
    characteristics: Vec<(String, String)>,
}

impl SubmitTaskRequest {
    /// Creates a request for the given task type.
    #[must_use]
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            id: None,
            task_type: task_type.into(),
            component: None,
            entity: None,
            submitter: None,
            characteristics: Vec::new(),
        }
    }

    /// Uses a caller-assigned task identifier instead of a fresh one.
    ///
    /// Submitting an identifier that is already queued surfaces as
    /// [`QueueRepositoryError::DuplicateTask`].
    #[must_use]
    pub const fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Scopes the task to a component and its owning entity.
    #[must_use]
    pub const fn with_subject(mut self, component: ComponentId, entity: EntityId) -> Self {
        self.component = Some(component);
        self.entity = Some(entity);
        self
    }

    /// Records the submitting principal.
    #[must_use]
    pub const fn with_submitter(mut self, submitter: SubmitterId) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Attaches a characteristic to the task.
    #[must_use]
    pub fn with_characteristic(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.characteristics.push((key.into(), value.into()));
        self
    }
}

/// Service-level errors for submission operations.
#[derive(Debug, Error)]
pub enum TaskSubmissionError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] QueueDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] QueueRepositoryError),
}

/// Result type for submission service operations.
pub type TaskSubmissionResult<T> = Result<T, TaskSubmissionError>;

/// Orchestrates validated task submission.
#[derive(Clone)]
pub struct TaskSubmitter<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> TaskSubmitter<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new submission service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Validates the request, stamps timestamps from the clock, and appends
    /// a pending task with its characteristics.
    ///
    /// # Errors
    ///
    /// Returns [`TaskSubmissionError::Domain`] on invalid input and
    /// [`TaskSubmissionError::Repository`] when persistence fails, notably
    /// [`QueueRepositoryError::DuplicateTask`] on identifier collision.
    pub async fn submit(&self, request: SubmitTaskRequest) -> TaskSubmissionResult<QueuedTask> {
        let task_type = TaskType::new(request.task_type)?;
        let submission = TaskSubmission {
            id: request.id.unwrap_or_else(TaskId::new),
            task_type,
            component: request.component,
            entity: request.entity,
            submitter: request.submitter,
        };
        let task = QueuedTask::new(submission, &*self.clock)?;

        let characteristics = request
            .characteristics
            .into_iter()
            .map(|(key, value)| {
                CharacteristicKey::new(key)
                    .map(|validated| TaskCharacteristic::new(task.id(), validated, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.repository.insert(&task).await?;
        if !characteristics.is_empty() {
            self.repository
                .insert_characteristics(&characteristics)
                .await?;
        }
        debug!(task = %task.id(), task_type = %task.task_type(), "task submitted");
        Ok(task)
    }

    /// Cancels a pending task.
    ///
    /// The delete is conditional on the task still being pending, so a task
    /// a worker has just claimed survives. Returns whether a row was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskSubmissionError::Repository`] when persistence fails.
    pub async fn cancel(&self, id: TaskId) -> TaskSubmissionResult<bool> {
        let deleted = self
            .repository
            .delete_by_id(id, Some(TaskStatus::Pending))
            .await?;
        Ok(deleted > 0)
    }
}
