//! `PostgreSQL` repository implementation for durable queue storage.

use super::{
    models::{TaskRow, characteristic_to_row, row_to_characteristic, row_to_task, to_new_row},
    schema::{task_characteristics, task_queue},
};
use crate::queue::{
    domain::{
        BranchKind, BranchWorkload, EligibleTask, EntityId, Page, QueuedTask, TaskCharacteristic,
        TaskId, TaskQuery, TaskStatus, TaskTransition, TaskType, WorkerId, characteristic_keys,
        task_types,
    },
    ports::{QueueRepository, QueueRepositoryError, QueueRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashSet;

/// `PostgreSQL` connection pool type used by queue adapters.
pub type QueuePgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed queue repository.
///
/// All operations run their blocking Diesel work on the dedicated thread
/// pool via [`tokio::task::spawn_blocking`]. Conditional mutations rely on
/// the database's row-level atomicity: a filtered `UPDATE`/`DELETE` whose
/// affected-row count decides the outcome.
#[derive(Debug, Clone)]
pub struct PostgresQueueRepository {
    pool: QueuePgPool,
}

impl PostgresQueueRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> QueueRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> QueueRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(QueueRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(QueueRepositoryError::persistence)?
    }
}

/// Candidate row of the eligibility query.
#[derive(Debug, QueryableByName)]
struct EligibleRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: uuid::Uuid,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    created_at: DateTime<Utc>,
}

/// Projection row of the branch workload queries.
#[derive(Debug, QueryableByName)]
struct WorkloadRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: uuid::Uuid,
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    task_type: String,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    component_uuid: Option<uuid::Uuid>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    entity_uuid: Option<uuid::Uuid>,
    #[diesel(sql_type = diesel::sql_types::Bool)]
    is_pull_request: bool,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    created_at: DateTime<Utc>,
}

fn workload_from_row(row: WorkloadRow) -> QueueRepositoryResult<BranchWorkload> {
    let task_type = TaskType::new(row.task_type).map_err(QueueRepositoryError::persistence)?;
    Ok(BranchWorkload {
        task_id: TaskId::from_uuid(row.id),
        task_type,
        component: row.component_uuid.map(crate::queue::domain::ComponentId::from_uuid),
        entity: row.entity_uuid.map(EntityId::from_uuid),
        branch_kind: if row.is_pull_request {
            BranchKind::PullRequest
        } else {
            BranchKind::Branch
        },
        created_at: row.created_at,
    })
}

/// Oldest claimable pending task under subject exclusivity.
///
/// Subject-less rows (both uuids null) are always claimable; every other
/// row is blocked while any in-progress row shares its coalesced subject.
const ELIGIBLE_SQL: &str = concat!(
    "SELECT t.id, t.created_at FROM task_queue t ",
    "WHERE t.status = 'pending' ",
    "AND t.task_type <> ALL($1) ",
    "AND ((t.entity_uuid IS NULL AND t.component_uuid IS NULL) ",
    "OR NOT EXISTS (",
    "SELECT 1 FROM task_queue r WHERE r.status = 'in_progress' ",
    "AND COALESCE(r.entity_uuid, r.component_uuid) ",
    "= COALESCE(t.entity_uuid, t.component_uuid))) ",
    "ORDER BY t.created_at ASC, t.id ASC LIMIT 1",
);

const WORKLOAD_SQL_PREFIX: &str = concat!(
    "SELECT t.id, t.task_type, t.component_uuid, t.entity_uuid, ",
    "(c.task_uuid IS NOT NULL) AS is_pull_request, t.created_at ",
    "FROM task_queue t ",
    "LEFT OUTER JOIN task_characteristics c ",
    "ON c.task_uuid = t.id AND c.kee = $1 ",
    "WHERE t.task_type = $2 AND t.status = $3 ",
    "ORDER BY t.created_at ASC, t.id ASC ",
);

fn load_workloads(
    connection: &mut PgConnection,
    status: TaskStatus,
    limit: Option<i64>,
) -> QueueRepositoryResult<Vec<BranchWorkload>> {
    let sql = limit.map_or_else(
        || WORKLOAD_SQL_PREFIX.to_owned(),
        |n| format!("{WORKLOAD_SQL_PREFIX} LIMIT {n}"),
    );
    let rows = diesel::sql_query(sql)
        .bind::<diesel::sql_types::Varchar, _>(characteristic_keys::PULL_REQUEST)
        .bind::<diesel::sql_types::Varchar, _>(task_types::REPORT)
        .bind::<diesel::sql_types::Varchar, _>(status.as_str())
        .load::<WorkloadRow>(connection)
        .map_err(QueueRepositoryError::persistence)?;
    rows.into_iter().map(workload_from_row).collect()
}

type BoxedTaskQuery<'a> = task_queue::BoxedQuery<'a, diesel::pg::Pg>;

fn apply_query_filters(query: &TaskQuery) -> BoxedTaskQuery<'_> {
    let mut filtered = task_queue::table.into_boxed();
    if let Some(entities) = query.entities() {
        let uuids: Vec<uuid::Uuid> = entities.iter().copied().map(EntityId::into_inner).collect();
        filtered = filtered.filter(task_queue::entity_uuid.eq_any(uuids));
    }
    if !query.statuses().is_empty() {
        let statuses: Vec<&str> = query.statuses().iter().map(|status| status.as_str()).collect();
        filtered = filtered.filter(task_queue::status.eq_any(statuses));
    }
    if let Some(task_type) = query.task_type() {
        filtered = filtered.filter(task_queue::task_type.eq(task_type.as_str().to_owned()));
    }
    if let Some(min) = query.min_created_at() {
        filtered = filtered.filter(task_queue::created_at.ge(min));
    }
    filtered
}

fn load_task_rows(rows: Vec<TaskRow>) -> QueueRepositoryResult<Vec<QueuedTask>> {
    rows.into_iter().map(row_to_task).collect()
}

#[async_trait]
impl QueueRepository for PostgresQueueRepository {
    async fn insert(&self, task: &QueuedTask) -> QueueRepositoryResult<()> {
        let task_id = task.id();
        let new_row = to_new_row(task);
        self.run_blocking(move |connection| {
            diesel::insert_into(task_queue::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        QueueRepositoryError::DuplicateTask(task_id)
                    }
                    _ => QueueRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn insert_characteristics(
        &self,
        characteristics: &[TaskCharacteristic],
    ) -> QueueRepositoryResult<()> {
        let rows: Vec<_> = characteristics.iter().map(characteristic_to_row).collect();
        self.run_blocking(move |connection| {
            diesel::insert_into(task_characteristics::table)
                .values(&rows)
                .execute(connection)
                .map_err(QueueRepositoryError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn select_by_id(&self, id: TaskId) -> QueueRepositoryResult<Option<QueuedTask>> {
        self.run_blocking(move |connection| {
            let row = task_queue::table
                .filter(task_queue::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(QueueRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn select_characteristics(
        &self,
        task_id: TaskId,
    ) -> QueueRepositoryResult<Vec<TaskCharacteristic>> {
        self.run_blocking(move |connection| {
            let rows = task_characteristics::table
                .filter(task_characteristics::task_uuid.eq(task_id.into_inner()))
                .select(super::models::CharacteristicRow::as_select())
                .load(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows.into_iter().map(row_to_characteristic).collect()
        })
        .await
    }

    async fn select_by_entity(&self, entity: EntityId) -> QueueRepositoryResult<Vec<QueuedTask>> {
        self.run_blocking(move |connection| {
            let rows = task_queue::table
                .filter(task_queue::entity_uuid.eq(entity.into_inner()))
                .order((task_queue::created_at.asc(), task_queue::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            load_task_rows(rows)
        })
        .await
    }

    async fn select_all_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueuedTask>> {
        self.run_blocking(move |connection| {
            let rows = task_queue::table
                .order((task_queue::created_at.asc(), task_queue::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            load_task_rows(rows)
        })
        .await
    }

    async fn select_pending_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueuedTask>> {
        self.run_blocking(move |connection| {
            let rows = task_queue::table
                .filter(task_queue::status.eq(TaskStatus::Pending.as_str()))
                .order((task_queue::created_at.asc(), task_queue::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            load_task_rows(rows)
        })
        .await
    }

    async fn delete_by_id(
        &self,
        id: TaskId,
        expected_status: Option<TaskStatus>,
    ) -> QueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, QueueRepositoryError, _>(|tx| {
                let base = diesel::delete(task_queue::table)
                    .filter(task_queue::id.eq(id.into_inner()));
                let deleted = match expected_status {
                    Some(status) => base
                        .filter(task_queue::status.eq(status.as_str()))
                        .execute(tx),
                    None => base.execute(tx),
                }
                .map_err(QueueRepositoryError::persistence)?;
                if deleted > 0 {
                    diesel::delete(task_characteristics::table)
                        .filter(task_characteristics::task_uuid.eq(id.into_inner()))
                        .execute(tx)
                        .map_err(QueueRepositoryError::persistence)?;
                }
                Ok(deleted as u64)
            })
        })
        .await
    }

    async fn select_eligible_for_claim(
        &self,
        excluded: &[TaskType],
    ) -> QueueRepositoryResult<Option<EligibleTask>> {
        let excluded_tags: Vec<String> = excluded
            .iter()
            .map(|task_type| task_type.as_str().to_owned())
            .collect();
        self.run_blocking(move |connection| {
            let row = diesel::sql_query(ELIGIBLE_SQL)
                .bind::<diesel::sql_types::Array<diesel::sql_types::Text>, _>(excluded_tags)
                .get_result::<EligibleRow>(connection)
                .optional()
                .map_err(QueueRepositoryError::persistence)?;
            Ok(row.map(|candidate| EligibleTask {
                id: TaskId::from_uuid(candidate.id),
                created_at: candidate.created_at,
            }))
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        id: TaskId,
        transition: &TaskTransition,
    ) -> QueueRepositoryResult<Option<QueuedTask>> {
        let swap = *transition;
        self.run_blocking(move |connection| {
            connection.transaction::<_, QueueRepositoryError, _>(|tx| {
                let affected = diesel::update(task_queue::table)
                    .filter(task_queue::id.eq(id.into_inner()))
                    .filter(task_queue::status.eq(swap.expected_status().as_str()))
                    .set((
                        task_queue::status.eq(swap.new_status().as_str()),
                        task_queue::worker_uuid.eq(swap.worker().map(WorkerId::into_inner)),
                        task_queue::started_at.eq(swap.started_at()),
                        task_queue::updated_at.eq(swap.updated_at()),
                    ))
                    .execute(tx)
                    .map_err(QueueRepositoryError::persistence)?;
                if affected == 0 {
                    return Ok(None);
                }
                let row = task_queue::table
                    .filter(task_queue::id.eq(id.into_inner()))
                    .select(TaskRow::as_select())
                    .first::<TaskRow>(tx)
                    .map_err(QueueRepositoryError::persistence)?;
                row_to_task(row).map(Some)
            })
        })
        .await
    }

    async fn reset_tasks_with_unknown_workers(
        &self,
        known: &HashSet<WorkerId>,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let known_uuids: Vec<uuid::Uuid> =
            known.iter().copied().map(WorkerId::into_inner).collect();
        self.run_blocking(move |connection| {
            let changes = (
                task_queue::status.eq(TaskStatus::Pending.as_str()),
                task_queue::worker_uuid.eq(None::<uuid::Uuid>),
                task_queue::started_at.eq(None::<DateTime<Utc>>),
                task_queue::updated_at.eq(now),
            );
            let base =
                diesel::update(task_queue::table)
                    .filter(task_queue::status.eq(TaskStatus::InProgress.as_str()));
            let reset = if known_uuids.is_empty() {
                base.set(changes).execute(connection)
            } else {
                base.filter(
                    task_queue::worker_uuid
                        .ne_all(known_uuids)
                        .or(task_queue::worker_uuid.is_null()),
                )
                .set(changes)
                .execute(connection)
            }
            .map_err(QueueRepositoryError::persistence)?;
            Ok(reset as u64)
        })
        .await
    }

    async fn select_in_progress_started_before(
        &self,
        before: DateTime<Utc>,
    ) -> QueueRepositoryResult<Vec<QueuedTask>> {
        self.run_blocking(move |connection| {
            let rows = task_queue::table
                .filter(task_queue::status.eq(TaskStatus::InProgress.as_str()))
                .filter(task_queue::started_at.lt(before))
                .order((task_queue::created_at.asc(), task_queue::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            load_task_rows(rows)
        })
        .await
    }

    async fn select_oldest_pending_branch_workloads(
        &self,
    ) -> QueueRepositoryResult<Vec<BranchWorkload>> {
        self.run_blocking(move |connection| {
            load_workloads(connection, TaskStatus::Pending, Some(100))
        })
        .await
    }

    async fn select_in_progress_with_characteristics(
        &self,
    ) -> QueueRepositoryResult<Vec<BranchWorkload>> {
        self.run_blocking(move |connection| {
            load_workloads(connection, TaskStatus::InProgress, None)
        })
        .await
    }

    async fn select_by_query(
        &self,
        query: &TaskQuery,
        page: Page,
    ) -> QueueRepositoryResult<Vec<QueuedTask>> {
        if query.matches_nothing() {
            return Ok(Vec::new());
        }
        let filters = query.clone();
        self.run_blocking(move |connection| {
            let rows = apply_query_filters(&filters)
                .order((task_queue::created_at.desc(), task_queue::id.asc()))
                .limit(i64::from(page.limit))
                .offset(i64::from(page.offset))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            load_task_rows(rows)
        })
        .await
    }

    async fn count_by_query(&self, query: &TaskQuery) -> QueueRepositoryResult<u64> {
        if query.matches_nothing() {
            return Ok(0);
        }
        let filters = query.clone();
        self.run_blocking(move |connection| {
            let count: i64 = apply_query_filters(&filters)
                .count()
                .get_result(connection)
                .map_err(QueueRepositoryError::persistence)?;
            Ok(count.unsigned_abs())
        })
        .await
    }

    async fn count_by_status(&self, status: TaskStatus) -> QueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let count: i64 = task_queue::table
                .filter(task_queue::status.eq(status.as_str()))
                .count()
                .get_result(connection)
                .map_err(QueueRepositoryError::persistence)?;
            Ok(count.unsigned_abs())
        })
        .await
    }

    async fn count_by_status_and_entity(
        &self,
        status: TaskStatus,
        entity: EntityId,
    ) -> QueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let count: i64 = task_queue::table
                .filter(task_queue::status.eq(status.as_str()))
                .filter(task_queue::entity_uuid.eq(entity.into_inner()))
                .count()
                .get_result(connection)
                .map_err(QueueRepositoryError::persistence)?;
            Ok(count.unsigned_abs())
        })
        .await
    }
}
