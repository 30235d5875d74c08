//! Diesel row models for queue persistence.

use super::schema::{task_characteristics, task_queue};
use crate::queue::{
    domain::{
        CharacteristicKey, ComponentId, EntityId, PersistedTaskData, QueuedTask, SubmitterId,
        TaskCharacteristic, TaskId, TaskStatus, TaskType, WorkerId,
    },
    ports::{QueueRepositoryError, QueueRepositoryResult},
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = task_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Task type tag.
    pub task_type: String,
    /// Component under work, if any.
    pub component_uuid: Option<uuid::Uuid>,
    /// Entity grouping the component, if any.
    pub entity_uuid: Option<uuid::Uuid>,
    /// Queue status.
    pub status: String,
    /// Submitting principal, if known.
    pub submitter_uuid: Option<uuid::Uuid>,
    /// Owning worker while in progress.
    pub worker_uuid: Option<uuid::Uuid>,
    /// Claim timestamp while in progress.
    pub started_at: Option<DateTime<Utc>>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_queue)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Task type tag.
    pub task_type: String,
    /// Component under work, if any.
    pub component_uuid: Option<uuid::Uuid>,
    /// Entity grouping the component, if any.
    pub entity_uuid: Option<uuid::Uuid>,
    /// Queue status.
    pub status: String,
    /// Submitting principal, if known.
    pub submitter_uuid: Option<uuid::Uuid>,
    /// Owning worker while in progress.
    pub worker_uuid: Option<uuid::Uuid>,
    /// Claim timestamp while in progress.
    pub started_at: Option<DateTime<Utc>>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row model for task characteristics.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Insertable)]
#[diesel(table_name = task_characteristics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CharacteristicRow {
    /// Owning task identifier.
    pub task_uuid: uuid::Uuid,
    /// Characteristic key.
    pub kee: String,
    /// Characteristic value.
    pub text_value: String,
}

/// Converts a domain task into its insert model.
#[must_use]
pub fn to_new_row(task: &QueuedTask) -> NewTaskRow {
    NewTaskRow {
        id: task.id().into_inner(),
        task_type: task.task_type().as_str().to_owned(),
        component_uuid: task.component().map(ComponentId::into_inner),
        entity_uuid: task.entity().map(EntityId::into_inner),
        status: task.status().as_str().to_owned(),
        submitter_uuid: task.submitter().map(SubmitterId::into_inner),
        worker_uuid: task.worker().map(WorkerId::into_inner),
        started_at: task.started_at(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    }
}

/// Rehydrates a stored row into the domain aggregate.
pub fn row_to_task(row: TaskRow) -> QueueRepositoryResult<QueuedTask> {
    let task_type = TaskType::new(row.task_type).map_err(QueueRepositoryError::persistence)?;
    let status =
        TaskStatus::try_from(row.status.as_str()).map_err(QueueRepositoryError::persistence)?;
    let data = PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        task_type,
        component: row.component_uuid.map(ComponentId::from_uuid),
        entity: row.entity_uuid.map(EntityId::from_uuid),
        status,
        submitter: row.submitter_uuid.map(SubmitterId::from_uuid),
        worker: row.worker_uuid.map(WorkerId::from_uuid),
        started_at: row.started_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    QueuedTask::from_persisted(data).map_err(QueueRepositoryError::persistence)
}

/// Converts a domain characteristic into its row model.
#[must_use]
pub fn characteristic_to_row(characteristic: &TaskCharacteristic) -> CharacteristicRow {
    CharacteristicRow {
        task_uuid: characteristic.task_id().into_inner(),
        kee: characteristic.key().as_str().to_owned(),
        text_value: characteristic.value().to_owned(),
    }
}

/// Rehydrates a stored characteristic row.
pub fn row_to_characteristic(row: CharacteristicRow) -> QueueRepositoryResult<TaskCharacteristic> {
    let key = CharacteristicKey::new(row.kee).map_err(QueueRepositoryError::persistence)?;
    Ok(TaskCharacteristic::new(
        TaskId::from_uuid(row.task_uuid),
        key,
        row.text_value,
    ))
}
