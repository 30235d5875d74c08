//! In-memory queue repository for tests and substitution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::queue::{
    domain::{
        BranchKind, BranchWorkload, EligibleTask, EntityId, Page, QueuedTask, TaskCharacteristic,
        TaskId, TaskQuery, TaskStatus, TaskSubject, TaskTransition, TaskType, WorkerId,
        characteristic_keys, task_types,
    },
    ports::{QueueRepository, QueueRepositoryError, QueueRepositoryResult},
};

/// Thread-safe in-memory queue repository.
///
/// All mutations run under a single write guard, which supplies the
/// conditional-write atomicity the port contract demands of a real store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueRepository {
    state: Arc<RwLock<InMemoryQueueState>>,
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    tasks: HashMap<TaskId, QueuedTask>,
    characteristics: HashMap<TaskId, Vec<TaskCharacteristic>>,
}

impl InMemoryQueueRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> QueueRepositoryResult<std::sync::RwLockReadGuard<'_, InMemoryQueueState>> {
        self.state
            .read()
            .map_err(|err| QueueRepositoryError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> QueueRepositoryResult<std::sync::RwLockWriteGuard<'_, InMemoryQueueState>> {
        self.state
            .write()
            .map_err(|err| QueueRepositoryError::persistence(std::io::Error::other(err.to_string())))
    }
}

/// Returns the subjects currently occupied by an in-progress task.
fn busy_subjects(state: &InMemoryQueueState) -> HashSet<TaskSubject> {
    state
        .tasks
        .values()
        .filter(|task| task.status() == TaskStatus::InProgress)
        .filter_map(QueuedTask::subject)
        .collect()
}

/// Sorts tasks oldest first, identifiers breaking creation-time ties.
fn sort_fifo(tasks: &mut [QueuedTask]) {
    tasks.sort_by_key(|task| (task.created_at(), task.id()));
}

fn matches_query(task: &QueuedTask, query: &TaskQuery) -> bool {
    if let Some(entities) = query.entities() {
        let in_scope = task.entity().is_some_and(|entity| entities.contains(&entity));
        if !in_scope {
            return false;
        }
    }
    if !query.statuses().is_empty() && !query.statuses().contains(&task.status()) {
        return false;
    }
    if query.task_type().is_some_and(|task_type| task.task_type() != task_type) {
        return false;
    }
    if query.min_created_at().is_some_and(|min| task.created_at() < min) {
        return false;
    }
    true
}

fn branch_kind_of(state: &InMemoryQueueState, task_id: TaskId) -> BranchKind {
    let has_pull_request = state
        .characteristics
        .get(&task_id)
        .is_some_and(|tags| {
            tags.iter()
                .any(|tag| tag.key().as_str() == characteristic_keys::PULL_REQUEST)
        });
    if has_pull_request {
        BranchKind::PullRequest
    } else {
        BranchKind::Branch
    }
}

fn to_workload(state: &InMemoryQueueState, task: &QueuedTask) -> BranchWorkload {
    BranchWorkload {
        task_id: task.id(),
        task_type: task.task_type().clone(),
        component: task.component(),
        entity: task.entity(),
        branch_kind: branch_kind_of(state, task.id()),
        created_at: task.created_at(),
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn insert(&self, task: &QueuedTask) -> QueueRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(QueueRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn insert_characteristics(
        &self,
        characteristics: &[TaskCharacteristic],
    ) -> QueueRepositoryResult<()> {
        let mut state = self.write()?;
        for characteristic in characteristics {
            state
                .characteristics
                .entry(characteristic.task_id())
                .or_default()
                .push(characteristic.clone());
        }
        Ok(())
    }

    async fn select_by_id(&self, id: TaskId) -> QueueRepositoryResult<Option<QueuedTask>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn select_characteristics(
        &self,
        task_id: TaskId,
    ) -> QueueRepositoryResult<Vec<TaskCharacteristic>> {
        let state = self.read()?;
        Ok(state.characteristics.get(&task_id).cloned().unwrap_or_default())
    }

    async fn select_by_entity(&self, entity: EntityId) -> QueueRepositoryResult<Vec<QueuedTask>> {
        let state = self.read()?;
        let mut tasks: Vec<QueuedTask> = state
            .tasks
            .values()
            .filter(|task| task.entity() == Some(entity))
            .cloned()
            .collect();
        sort_fifo(&mut tasks);
        Ok(tasks)
    }

    async fn select_all_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueuedTask>> {
        let state = self.read()?;
        let mut tasks: Vec<QueuedTask> = state.tasks.values().cloned().collect();
        sort_fifo(&mut tasks);
        Ok(tasks)
    }

    async fn select_pending_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueuedTask>> {
        let state = self.read()?;
        let mut tasks: Vec<QueuedTask> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .cloned()
            .collect();
        sort_fifo(&mut tasks);
        Ok(tasks)
    }

    async fn delete_by_id(
        &self,
        id: TaskId,
        expected_status: Option<TaskStatus>,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        let matches = state
            .tasks
            .get(&id)
            .is_some_and(|task| expected_status.is_none_or(|status| task.status() == status));
        if !matches {
            return Ok(0);
        }
        state.tasks.remove(&id);
        state.characteristics.remove(&id);
        Ok(1)
    }

    async fn select_eligible_for_claim(
        &self,
        excluded: &[TaskType],
    ) -> QueueRepositoryResult<Option<EligibleTask>> {
        let state = self.read()?;
        let busy = busy_subjects(&state);
        let candidate = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .filter(|task| !excluded.contains(task.task_type()))
            // Subject-less tasks never conflict with anything.
            .filter(|task| task.subject().is_none_or(|subject| !busy.contains(&subject)))
            .min_by_key(|task| (task.created_at(), task.id()));
        Ok(candidate.map(|task| EligibleTask {
            id: task.id(),
            created_at: task.created_at(),
        }))
    }

    async fn compare_and_swap(
        &self,
        id: TaskId,
        transition: &TaskTransition,
    ) -> QueueRepositoryResult<Option<QueuedTask>> {
        let mut state = self.write()?;
        let Some(task) = state.tasks.get(&id) else {
            return Ok(None);
        };
        if !transition.matches(task) {
            return Ok(None);
        }
        let updated = transition.apply(task);
        state.tasks.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn reset_tasks_with_unknown_workers(
        &self,
        known: &HashSet<WorkerId>,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        let release = TaskTransition::release(now);
        let orphaned: Vec<TaskId> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::InProgress)
            .filter(|task| {
                task.worker()
                    .is_none_or(|worker| !known.contains(&worker))
            })
            .map(QueuedTask::id)
            .collect();
        let mut reset = 0;
        for id in orphaned {
            if let Some(task) = state.tasks.get(&id) {
                let updated = release.apply(task);
                state.tasks.insert(id, updated);
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn select_in_progress_started_before(
        &self,
        before: DateTime<Utc>,
    ) -> QueueRepositoryResult<Vec<QueuedTask>> {
        let state = self.read()?;
        let mut tasks: Vec<QueuedTask> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::InProgress)
            .filter(|task| task.started_at().is_some_and(|started| started < before))
            .cloned()
            .collect();
        sort_fifo(&mut tasks);
        Ok(tasks)
    }

    async fn select_oldest_pending_branch_workloads(
        &self,
    ) -> QueueRepositoryResult<Vec<BranchWorkload>> {
        let state = self.read()?;
        let mut analyses: Vec<&QueuedTask> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .filter(|task| task.task_type().as_str() == task_types::REPORT)
            .collect();
        analyses.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(analyses
            .into_iter()
            .take(100)
            .map(|task| to_workload(&state, task))
            .collect())
    }

    async fn select_in_progress_with_characteristics(
        &self,
    ) -> QueueRepositoryResult<Vec<BranchWorkload>> {
        let state = self.read()?;
        let mut analyses: Vec<&QueuedTask> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::InProgress)
            .filter(|task| task.task_type().as_str() == task_types::REPORT)
            .collect();
        analyses.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(analyses
            .into_iter()
            .map(|task| to_workload(&state, task))
            .collect())
    }

    async fn select_by_query(
        &self,
        query: &TaskQuery,
        page: Page,
    ) -> QueueRepositoryResult<Vec<QueuedTask>> {
        if query.matches_nothing() {
            return Ok(Vec::new());
        }
        let state = self.read()?;
        let mut tasks: Vec<QueuedTask> = state
            .tasks
            .values()
            .filter(|task| matches_query(task, query))
            .cloned()
            .collect();
        tasks.sort_by_key(|task| (std::cmp::Reverse(task.created_at()), task.id()));
        let offset = usize::try_from(page.offset).map_err(QueueRepositoryError::persistence)?;
        let limit = usize::try_from(page.limit).map_err(QueueRepositoryError::persistence)?;
        Ok(tasks.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_by_query(&self, query: &TaskQuery) -> QueueRepositoryResult<u64> {
        if query.matches_nothing() {
            return Ok(0);
        }
        let state = self.read()?;
        let count = state
            .tasks
            .values()
            .filter(|task| matches_query(task, query))
            .count();
        u64::try_from(count).map_err(QueueRepositoryError::persistence)
    }

    async fn count_by_status(&self, status: TaskStatus) -> QueueRepositoryResult<u64> {
        let state = self.read()?;
        let count = state
            .tasks
            .values()
            .filter(|task| task.status() == status)
            .count();
        u64::try_from(count).map_err(QueueRepositoryError::persistence)
    }

    async fn count_by_status_and_entity(
        &self,
        status: TaskStatus,
        entity: EntityId,
    ) -> QueueRepositoryResult<u64> {
        let state = self.read()?;
        let count = state
            .tasks
            .values()
            .filter(|task| task.status() == status && task.entity() == Some(entity))
            .count();
        u64::try_from(count).map_err(QueueRepositoryError::persistence)
    }
}
