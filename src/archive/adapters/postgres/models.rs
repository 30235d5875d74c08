//! Diesel row models for archive persistence.

use super::schema::task_activity;
use crate::archive::{
    domain::{ActivityRecord, ActivityStatus, ExecutionError, PersistedActivityData},
    ports::{ArchiveRepositoryError, ArchiveRepositoryResult},
};
use crate::queue::domain::{ComponentId, SubmitterId, TaskId, TaskType, WorkerId};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for activity records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = task_activity)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActivityRow {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Task type tag.
    pub task_type: String,
    /// Component the task worked on, if any.
    pub component_uuid: Option<uuid::Uuid>,
    /// Root-branch component identity, if any.
    pub main_component_uuid: Option<uuid::Uuid>,
    /// Terminal status.
    pub status: String,
    /// Latest-outcome flag over the component key.
    pub is_last: bool,
    /// Latest-outcome grouping key over the component.
    pub is_last_key: String,
    /// Latest-outcome flag over the main-component key.
    pub main_is_last: bool,
    /// Latest-outcome grouping key over the main component.
    pub main_is_last_key: String,
    /// Submitting principal, if known.
    pub submitter_uuid: Option<uuid::Uuid>,
    /// Worker that executed the task, if it ran.
    pub worker_uuid: Option<uuid::Uuid>,
    /// When the task entered the queue.
    pub submitted_at: DateTime<Utc>,
    /// When a worker claimed the task, if it ran.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached its terminal state.
    pub executed_at: DateTime<Utc>,
    /// Execution duration in milliseconds, if it ran.
    pub execution_time_ms: Option<i64>,
    /// Failure message, present exactly when failed.
    pub error_message: Option<String>,
    /// Failure classifier, if any.
    pub error_kind: Option<String>,
    /// Captured stacktrace, if any.
    pub error_stacktrace: Option<String>,
    /// Number of warnings raised during execution.
    pub warning_count: i32,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for activity records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_activity)]
pub struct NewActivityRow {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Task type tag.
    pub task_type: String,
    /// Component the task worked on, if any.
    pub component_uuid: Option<uuid::Uuid>,
    /// Root-branch component identity, if any.
    pub main_component_uuid: Option<uuid::Uuid>,
    /// Terminal status.
    pub status: String,
    /// Latest-outcome flag over the component key.
    pub is_last: bool,
    /// Latest-outcome grouping key over the component.
    pub is_last_key: String,
    /// Latest-outcome flag over the main-component key.
    pub main_is_last: bool,
    /// Latest-outcome grouping key over the main component.
    pub main_is_last_key: String,
    /// Submitting principal, if known.
    pub submitter_uuid: Option<uuid::Uuid>,
    /// Worker that executed the task, if it ran.
    pub worker_uuid: Option<uuid::Uuid>,
    /// When the task entered the queue.
    pub submitted_at: DateTime<Utc>,
    /// When a worker claimed the task, if it ran.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached its terminal state.
    pub executed_at: DateTime<Utc>,
    /// Execution duration in milliseconds, if it ran.
    pub execution_time_ms: Option<i64>,
    /// Failure message, present exactly when failed.
    pub error_message: Option<String>,
    /// Failure classifier, if any.
    pub error_kind: Option<String>,
    /// Captured stacktrace, if any.
    pub error_stacktrace: Option<String>,
    /// Number of warnings raised during execution.
    pub warning_count: i32,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Converts a domain record into its insert model.
pub fn to_new_row(record: &ActivityRecord) -> ArchiveRepositoryResult<NewActivityRow> {
    let warning_count =
        i32::try_from(record.warning_count()).map_err(ArchiveRepositoryError::persistence)?;
    Ok(NewActivityRow {
        id: record.id().into_inner(),
        task_type: record.task_type().as_str().to_owned(),
        component_uuid: record.component().map(ComponentId::into_inner),
        main_component_uuid: record.main_component().map(ComponentId::into_inner),
        status: record.status().as_str().to_owned(),
        is_last: record.is_last(),
        is_last_key: record.is_last_key().to_owned(),
        main_is_last: record.main_is_last(),
        main_is_last_key: record.main_is_last_key().to_owned(),
        submitter_uuid: record.submitter().map(SubmitterId::into_inner),
        worker_uuid: record.worker().map(WorkerId::into_inner),
        submitted_at: record.submitted_at(),
        started_at: record.started_at(),
        executed_at: record.executed_at(),
        execution_time_ms: record.execution_time_ms(),
        error_message: record.error().map(|error| error.message.clone()),
        error_kind: record.error().and_then(|error| error.kind.clone()),
        error_stacktrace: record.error().and_then(|error| error.stacktrace.clone()),
        warning_count,
        created_at: record.created_at(),
        updated_at: record.updated_at(),
    })
}

/// Rehydrates a stored row into the domain record.
pub fn row_to_record(row: ActivityRow) -> ArchiveRepositoryResult<ActivityRecord> {
    let task_type = TaskType::new(row.task_type).map_err(ArchiveRepositoryError::persistence)?;
    let warning_count =
        u32::try_from(row.warning_count).map_err(ArchiveRepositoryError::persistence)?;
    let status = ActivityStatus::try_from(row.status.as_str())
        .map_err(ArchiveRepositoryError::persistence)?;
    let error = row.error_message.map(|message| ExecutionError {
        message,
        kind: row.error_kind,
        stacktrace: row.error_stacktrace,
    });
    let data = PersistedActivityData {
        id: TaskId::from_uuid(row.id),
        task_type,
        component: row.component_uuid.map(ComponentId::from_uuid),
        main_component: row.main_component_uuid.map(ComponentId::from_uuid),
        status,
        is_last: row.is_last,
        is_last_key: row.is_last_key,
        main_is_last: row.main_is_last,
        main_is_last_key: row.main_is_last_key,
        submitter: row.submitter_uuid.map(SubmitterId::from_uuid),
        worker: row.worker_uuid.map(WorkerId::from_uuid),
        submitted_at: row.submitted_at,
        started_at: row.started_at,
        executed_at: row.executed_at,
        execution_time_ms: row.execution_time_ms,
        error,
        warning_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    ActivityRecord::from_persisted(data).map_err(ArchiveRepositoryError::persistence)
}
