//! In-memory archive repository for tests and substitution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::archive::{
    domain::{ActivityQuery, ActivityRecord, ActivityStatus, PersistedActivityData},
    ports::{ArchiveRepository, ArchiveRepositoryError, ArchiveRepositoryResult},
};
use crate::queue::domain::{ComponentId, Page, TaskId};

/// Thread-safe in-memory archive repository.
///
/// State holds persisted row data rather than domain records, so flag
/// clearing mutates rows the way a database update would. The whole
/// clear-then-insert sequence runs under one write guard.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchiveRepository {
    state: Arc<RwLock<HashMap<TaskId, PersistedActivityData>>>,
}

impl InMemoryArchiveRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> ArchiveRepositoryResult<std::sync::RwLockReadGuard<'_, HashMap<TaskId, PersistedActivityData>>>
    {
        self.state.read().map_err(|err| {
            ArchiveRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(
        &self,
    ) -> ArchiveRepositoryResult<
        std::sync::RwLockWriteGuard<'_, HashMap<TaskId, PersistedActivityData>>,
    > {
        self.state.write().map_err(|err| {
            ArchiveRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

fn to_persisted(record: &ActivityRecord) -> PersistedActivityData {
    PersistedActivityData {
        id: record.id(),
        task_type: record.task_type().clone(),
        component: record.component(),
        main_component: record.main_component(),
        status: record.status(),
        is_last: record.is_last(),
        is_last_key: record.is_last_key().to_owned(),
        main_is_last: record.main_is_last(),
        main_is_last_key: record.main_is_last_key().to_owned(),
        submitter: record.submitter(),
        worker: record.worker(),
        submitted_at: record.submitted_at(),
        started_at: record.started_at(),
        executed_at: record.executed_at(),
        execution_time_ms: record.execution_time_ms(),
        error: record.error().cloned(),
        warning_count: record.warning_count(),
        created_at: record.created_at(),
        updated_at: record.updated_at(),
    }
}

fn to_record(data: &PersistedActivityData) -> ArchiveRepositoryResult<ActivityRecord> {
    ActivityRecord::from_persisted(data.clone()).map_err(ArchiveRepositoryError::persistence)
}

fn matches_query(data: &PersistedActivityData, query: &ActivityQuery) -> bool {
    if let Some(main_components) = query.main_components() {
        let in_scope = data
            .main_component
            .is_some_and(|component| main_components.contains(&component));
        if !in_scope {
            return false;
        }
    }
    if query
        .component()
        .is_some_and(|component| data.component != Some(component))
    {
        return false;
    }
    if !query.statuses().is_empty() && !query.statuses().contains(&data.status) {
        return false;
    }
    if query
        .task_type()
        .is_some_and(|task_type| &data.task_type != task_type)
    {
        return false;
    }
    if query.is_only_latest() && !data.is_last {
        return false;
    }
    if query
        .min_submitted_at()
        .is_some_and(|min| data.submitted_at < min)
    {
        return false;
    }
    if query
        .max_executed_at()
        .is_some_and(|max| data.executed_at > max)
    {
        return false;
    }
    true
}

#[async_trait]
impl ArchiveRepository for InMemoryArchiveRepository {
    async fn insert(&self, record: &ActivityRecord) -> ArchiveRepositoryResult<()> {
        let mut state = self.write()?;
        if state.contains_key(&record.id()) {
            return Err(ArchiveRepositoryError::DuplicateActivity(record.id()));
        }
        if record.is_last() {
            let now = record.created_at();
            for row in state.values_mut() {
                if row.is_last && row.is_last_key == record.is_last_key() {
                    row.is_last = false;
                    row.updated_at = now;
                }
                if row.main_is_last && row.main_is_last_key == record.main_is_last_key() {
                    row.main_is_last = false;
                    row.updated_at = now;
                }
            }
        }
        state.insert(record.id(), to_persisted(record));
        Ok(())
    }

    async fn select_by_id(&self, id: TaskId) -> ArchiveRepositoryResult<Option<ActivityRecord>> {
        let state = self.read()?;
        state.get(&id).map(to_record).transpose()
    }

    async fn select_by_query(
        &self,
        query: &ActivityQuery,
        page: Page,
    ) -> ArchiveRepositoryResult<Vec<ActivityRecord>> {
        if query.matches_nothing() {
            return Ok(Vec::new());
        }
        let state = self.read()?;
        let mut rows: Vec<&PersistedActivityData> = state
            .values()
            .filter(|row| matches_query(row, query))
            .collect();
        rows.sort_by_key(|row| (std::cmp::Reverse(row.executed_at), row.id));
        let offset = usize::try_from(page.offset).map_err(ArchiveRepositoryError::persistence)?;
        let limit = usize::try_from(page.limit).map_err(ArchiveRepositoryError::persistence)?;
        rows.into_iter()
            .skip(offset)
            .take(limit)
            .map(to_record)
            .collect()
    }

    async fn count_by_query(&self, query: &ActivityQuery) -> ArchiveRepositoryResult<u64> {
        if query.matches_nothing() {
            return Ok(0);
        }
        let state = self.read()?;
        let count = state.values().filter(|row| matches_query(row, query)).count();
        u64::try_from(count).map_err(ArchiveRepositoryError::persistence)
    }

    async fn count_last_by_status_and_main_component(
        &self,
        status: ActivityStatus,
        main_component: Option<ComponentId>,
    ) -> ArchiveRepositoryResult<u64> {
        let state = self.read()?;
        let count = state
            .values()
            .filter(|row| row.main_is_last && row.status == status)
            .filter(|row| {
                main_component.is_none_or(|component| row.main_component == Some(component))
            })
            .count();
        u64::try_from(count).map_err(ArchiveRepositoryError::persistence)
    }

    async fn select_older_than(
        &self,
        before: DateTime<Utc>,
    ) -> ArchiveRepositoryResult<Vec<TaskId>> {
        let state = self.read()?;
        Ok(state
            .values()
            .filter(|row| row.executed_at < before)
            .map(|row| row.id)
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[TaskId]) -> ArchiveRepositoryResult<u64> {
        let mut state = self.write()?;
        let mut deleted = 0;
        for id in ids {
            if state.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
