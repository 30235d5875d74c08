//! `PostgreSQL` repository implementation for the activity archive.

use super::{
    models::{ActivityRow, row_to_record, to_new_row},
    schema::task_activity,
};
use crate::archive::{
    domain::{ActivityQuery, ActivityRecord, ActivityStatus},
    ports::{ArchiveRepository, ArchiveRepositoryError, ArchiveRepositoryResult},
};
use crate::queue::domain::{ComponentId, Page, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by archive adapters.
pub type ArchivePgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed archive repository.
///
/// Blocking Diesel work runs via [`tokio::task::spawn_blocking`]. The
/// latest-outcome flag maintenance and the record insert share one
/// database transaction.
#[derive(Debug, Clone)]
pub struct PostgresArchiveRepository {
    pool: ArchivePgPool,
}

impl PostgresArchiveRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ArchivePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ArchiveRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ArchiveRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ArchiveRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ArchiveRepositoryError::persistence)?
    }
}

type BoxedActivityQuery<'a> = task_activity::BoxedQuery<'a, diesel::pg::Pg>;

fn apply_query_filters(query: &ActivityQuery) -> BoxedActivityQuery<'_> {
    let mut filtered = task_activity::table.into_boxed();
    if let Some(main_components) = query.main_components() {
        let uuids: Vec<uuid::Uuid> = main_components
            .iter()
            .copied()
            .map(ComponentId::into_inner)
            .collect();
        filtered = filtered.filter(task_activity::main_component_uuid.eq_any(uuids));
    }
    if let Some(component) = query.component() {
        filtered = filtered.filter(task_activity::component_uuid.eq(component.into_inner()));
    }
    if !query.statuses().is_empty() {
        let statuses: Vec<&str> = query.statuses().iter().map(|status| status.as_str()).collect();
        filtered = filtered.filter(task_activity::status.eq_any(statuses));
    }
    if let Some(task_type) = query.task_type() {
        filtered = filtered.filter(task_activity::task_type.eq(task_type.as_str().to_owned()));
    }
    if query.is_only_latest() {
        filtered = filtered.filter(task_activity::is_last.eq(true));
    }
    if let Some(min) = query.min_submitted_at() {
        filtered = filtered.filter(task_activity::submitted_at.ge(min));
    }
    if let Some(max) = query.max_executed_at() {
        filtered = filtered.filter(task_activity::executed_at.le(max));
    }
    filtered
}

fn load_activity_rows(rows: Vec<ActivityRow>) -> ArchiveRepositoryResult<Vec<ActivityRecord>> {
    rows.into_iter().map(row_to_record).collect()
}

#[async_trait]
impl ArchiveRepository for PostgresArchiveRepository {
    async fn insert(&self, record: &ActivityRecord) -> ArchiveRepositoryResult<()> {
        let record_id = record.id();
        let new_row = to_new_row(record)?;
        self.run_blocking(move |connection| {
            connection.transaction::<_, ArchiveRepositoryError, _>(|tx| {
                if new_row.is_last {
                    diesel::update(task_activity::table)
                        .filter(task_activity::is_last.eq(true))
                        .filter(task_activity::is_last_key.eq(new_row.is_last_key.clone()))
                        .set((
                            task_activity::is_last.eq(false),
                            task_activity::updated_at.eq(new_row.created_at),
                        ))
                        .execute(tx)
                        .map_err(ArchiveRepositoryError::persistence)?;
                    diesel::update(task_activity::table)
                        .filter(task_activity::main_is_last.eq(true))
                        .filter(
                            task_activity::main_is_last_key.eq(new_row.main_is_last_key.clone()),
                        )
                        .set((
                            task_activity::main_is_last.eq(false),
                            task_activity::updated_at.eq(new_row.created_at),
                        ))
                        .execute(tx)
                        .map_err(ArchiveRepositoryError::persistence)?;
                }
                diesel::insert_into(task_activity::table)
                    .values(&new_row)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            ArchiveRepositoryError::DuplicateActivity(record_id)
                        }
                        _ => ArchiveRepositoryError::persistence(err),
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn select_by_id(&self, id: TaskId) -> ArchiveRepositoryResult<Option<ActivityRecord>> {
        self.run_blocking(move |connection| {
            let row = task_activity::table
                .filter(task_activity::id.eq(id.into_inner()))
                .select(ActivityRow::as_select())
                .first::<ActivityRow>(connection)
                .optional()
                .map_err(ArchiveRepositoryError::persistence)?;
            row.map(row_to_record).transpose()
        })
        .await
    }

    async fn select_by_query(
        &self,
        query: &ActivityQuery,
        page: Page,
    ) -> ArchiveRepositoryResult<Vec<ActivityRecord>> {
        if query.matches_nothing() {
            return Ok(Vec::new());
        }
        let filters = query.clone();
        self.run_blocking(move |connection| {
            let rows = apply_query_filters(&filters)
                .order((task_activity::executed_at.desc(), task_activity::id.asc()))
                .limit(i64::from(page.limit))
                .offset(i64::from(page.offset))
                .select(ActivityRow::as_select())
                .load::<ActivityRow>(connection)
                .map_err(ArchiveRepositoryError::persistence)?;
            load_activity_rows(rows)
        })
        .await
    }

    async fn count_by_query(&self, query: &ActivityQuery) -> ArchiveRepositoryResult<u64> {
        if query.matches_nothing() {
            return Ok(0);
        }
        let filters = query.clone();
        self.run_blocking(move |connection| {
            let count: i64 = apply_query_filters(&filters)
                .count()
                .get_result(connection)
                .map_err(ArchiveRepositoryError::persistence)?;
            Ok(count.unsigned_abs())
        })
        .await
    }

    async fn count_last_by_status_and_main_component(
        &self,
        status: ActivityStatus,
        main_component: Option<ComponentId>,
    ) -> ArchiveRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let base = task_activity::table
                .filter(task_activity::main_is_last.eq(true))
                .filter(task_activity::status.eq(status.as_str()));
            let count: i64 = match main_component {
                Some(component) => base
                    .filter(task_activity::main_component_uuid.eq(component.into_inner()))
                    .count()
                    .get_result(connection),
                None => base.count().get_result(connection),
            }
            .map_err(ArchiveRepositoryError::persistence)?;
            Ok(count.unsigned_abs())
        })
        .await
    }

    async fn select_older_than(
        &self,
        before: DateTime<Utc>,
    ) -> ArchiveRepositoryResult<Vec<TaskId>> {
        self.run_blocking(move |connection| {
            let ids = task_activity::table
                .filter(task_activity::executed_at.lt(before))
                .select(task_activity::id)
                .load::<uuid::Uuid>(connection)
                .map_err(ArchiveRepositoryError::persistence)?;
            Ok(ids.into_iter().map(TaskId::from_uuid).collect())
        })
        .await
    }

    async fn delete_by_ids(&self, ids: &[TaskId]) -> ArchiveRepositoryResult<u64> {
        let uuids: Vec<uuid::Uuid> = ids.iter().copied().map(TaskId::into_inner).collect();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(task_activity::table)
                .filter(task_activity::id.eq_any(uuids))
                .execute(connection)
                .map_err(ArchiveRepositoryError::persistence)?;
            Ok(deleted as u64)
        })
        .await
    }
}
