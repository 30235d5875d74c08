//! Queue persistence against a real `PostgreSQL` schema.

use std::collections::HashSet;
use std::sync::Arc;

use conveyor::queue::{
    domain::{ComponentId, EntityId, Page, QueuedTask, TaskQuery, TaskStatus, WorkerId, task_types},
    ports::QueueRepository,
    services::{LivenessReconciler, SubmitTaskRequest, TaskSubmitter, WorkerGate},
};
use rstest::rstest;

use super::helpers::{
    DB_LOCK, FixedClock, queue_repository, truncate_tables,
};

async fn submit_at(
    repository: &Arc<conveyor::queue::adapters::postgres::PostgresQueueRepository>,
    secs: i64,
    request: SubmitTaskRequest,
) -> QueuedTask {
    TaskSubmitter::new(Arc::clone(repository), Arc::new(FixedClock::at(secs)))
        .submit(request)
        .await
        .expect("submission succeeds")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn submitted_task_round_trips_with_characteristics() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let repository = Arc::new(queue_repository());

    let submitted = submit_at(
        &repository,
        100,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(ComponentId::new(), EntityId::new())
            .with_characteristic("branch", "main"),
    )
    .await;

    let fetched = repository
        .select_by_id(submitted.id())
        .await
        .expect("lookup succeeds")
        .expect("task stored");
    assert_eq!(fetched, submitted);

    let tags = repository
        .select_characteristics(submitted.id())
        .await
        .expect("characteristics load");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].value(), "main");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn claim_respects_subject_exclusivity_and_fifo_order() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let repository = Arc::new(queue_repository());

    let busy_entity = EntityId::new();
    let head = submit_at(
        &repository,
        100,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(ComponentId::new(), busy_entity),
    )
    .await;
    submit_at(
        &repository,
        200,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(ComponentId::new(), busy_entity),
    )
    .await;
    let other = submit_at(
        &repository,
        300,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(ComponentId::new(), EntityId::new()),
    )
    .await;

    let gate = WorkerGate::new(
        Arc::clone(&repository),
        Arc::new(FixedClock::at(400)),
        Vec::new(),
    );
    let first = gate
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    assert_eq!(first.id(), head.id());
    assert_eq!(first.status(), TaskStatus::InProgress);

    let second = gate
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("other subject claimable");
    assert_eq!(second.id(), other.id());

    let drained = gate.claim_next(WorkerId::new()).await.expect("claim succeeds");
    assert!(drained.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn restart_sweep_requeues_orphaned_claims() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let repository = Arc::new(queue_repository());

    let task = submit_at(&repository, 100, SubmitTaskRequest::new(task_types::REPORT)).await;
    WorkerGate::new(
        Arc::clone(&repository),
        Arc::new(FixedClock::at(200)),
        Vec::new(),
    )
    .claim_next(WorkerId::new())
    .await
    .expect("claim succeeds")
    .expect("queue has eligible work");

    let reset = LivenessReconciler::new(Arc::clone(&repository), Arc::new(FixedClock::at(300)))
        .reset_tasks_with_unknown_workers(&HashSet::new())
        .await
        .expect("reset succeeds");
    assert_eq!(reset, 1);

    let reloaded = repository
        .select_by_id(task.id())
        .await
        .expect("lookup succeeds")
        .expect("task still queued");
    assert_eq!(reloaded.status(), TaskStatus::Pending);
    assert_eq!(reloaded.worker(), None);
    assert_eq!(reloaded.started_at(), None);
    assert_eq!(reloaded.created_at(), task.created_at());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn listing_queries_paginate_newest_first() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let repository = Arc::new(queue_repository());

    let entity = EntityId::new();
    let mut submitted = Vec::new();
    for index in 0..3_i64 {
        submitted.push(
            submit_at(
                &repository,
                100 * (index + 1),
                SubmitTaskRequest::new(task_types::REPORT)
                    .with_subject(ComponentId::new(), entity),
            )
            .await,
        );
    }

    let query = TaskQuery::new().with_entities(vec![entity]);
    let first_page = repository
        .select_by_query(&query, Page::first(2))
        .await
        .expect("query succeeds");
    assert_eq!(
        first_page.iter().map(QueuedTask::id).collect::<Vec<_>>(),
        vec![submitted[2].id(), submitted[1].id()]
    );
    assert_eq!(repository.count_by_query(&query).await.expect("count"), 3);

    let empty_scope = TaskQuery::new().with_entities(Vec::new());
    assert!(
        repository
            .select_by_query(&empty_scope, Page::first(10))
            .await
            .expect("query succeeds")
            .is_empty()
    );
}
