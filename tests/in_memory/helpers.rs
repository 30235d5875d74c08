//! Shared test helpers for in-memory end-to-end tests.

use chrono::{DateTime, Local, TimeZone, Utc};
use conveyor::archive::adapters::memory::InMemoryArchiveRepository;
use conveyor::queue::{
    adapters::memory::InMemoryQueueRepository,
    domain::{QueuedTask, TaskType},
    services::{SubmitTaskRequest, TaskSubmitter, WorkerGate},
};
use mockable::Clock;
use rstest::fixture;
use std::sync::Arc;

/// Clock pinned to a configurable instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock reading `secs` seconds after the epoch.
    pub fn at(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"))
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Provides a fresh in-memory queue repository for each test.
#[fixture]
pub fn queue_repo() -> Arc<InMemoryQueueRepository> {
    Arc::new(InMemoryQueueRepository::new())
}

/// Provides a fresh in-memory archive repository for each test.
#[fixture]
pub fn archive_repo() -> Arc<InMemoryArchiveRepository> {
    Arc::new(InMemoryArchiveRepository::new())
}

/// Submits a task with the clock pinned at `secs`.
pub async fn submit_at(
    repository: &Arc<InMemoryQueueRepository>,
    secs: i64,
    request: SubmitTaskRequest,
) -> QueuedTask {
    TaskSubmitter::new(Arc::clone(repository), Arc::new(FixedClock::at(secs)))
        .submit(request)
        .await
        .expect("submission succeeds")
}

/// Builds a worker gate with the clock pinned at `secs`.
pub fn gate_at(
    repository: &Arc<InMemoryQueueRepository>,
    secs: i64,
    excluded: Vec<TaskType>,
) -> WorkerGate<InMemoryQueueRepository, FixedClock> {
    WorkerGate::new(
        Arc::clone(repository),
        Arc::new(FixedClock::at(secs)),
        excluded,
    )
}
