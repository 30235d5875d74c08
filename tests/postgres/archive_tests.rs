//! Archive persistence against a real `PostgreSQL` schema.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use conveyor::{
    archive::{
        domain::{ActivityOutcome, ActivityQuery, ActivityStatus, ExecutionError},
        ports::{ArchiveRepository, ArchiveRepositoryError},
        services::TaskFinaliser,
    },
    queue::{
        domain::{ComponentId, EntityId, Page, QueuedTask, TaskStatus, WorkerId, task_types},
        ports::QueueRepository,
        services::{SubmitTaskRequest, TaskSubmitter, WorkerGate},
    },
};
use rstest::rstest;

use super::helpers::{
    DB_LOCK, FixedClock, archive_repository, queue_repository, truncate_tables,
};

type TestQueue = conveyor::queue::adapters::postgres::PostgresQueueRepository;
type TestArchive = conveyor::archive::adapters::postgres::PostgresArchiveRepository;

struct Harness {
    queue: Arc<TestQueue>,
    archive: Arc<TestArchive>,
}

impl Harness {
    fn new() -> Self {
        Self {
            queue: Arc::new(queue_repository()),
            archive: Arc::new(archive_repository()),
        }
    }

    async fn claimed_task(&self, component: ComponentId, claim_secs: i64) -> QueuedTask {
        let submitter = TaskSubmitter::new(
            Arc::clone(&self.queue),
            Arc::new(FixedClock::at(claim_secs - 100)),
        );
        submitter
            .submit(
                SubmitTaskRequest::new(task_types::REPORT)
                    .with_subject(component, EntityId::new()),
            )
            .await
            .expect("submission succeeds");
        WorkerGate::new(
            Arc::clone(&self.queue),
            Arc::new(FixedClock::at(claim_secs)),
            Vec::new(),
        )
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work")
    }

    fn finaliser(&self, secs: i64) -> TaskFinaliser<TestQueue, TestArchive, FixedClock> {
        TaskFinaliser::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.archive),
            Arc::new(FixedClock::at(secs)),
        )
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn finalised_task_moves_from_queue_to_archive() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let harness = Harness::new();

    let component = ComponentId::new();
    let task = harness.claimed_task(component, 200).await;
    let record = harness
        .finaliser(260)
        .finalise(&task, Some(component), ActivityOutcome::Success { warning_count: 2 })
        .await
        .expect("finalisation succeeds");

    assert!(
        harness
            .queue
            .select_by_id(task.id())
            .await
            .expect("lookup succeeds")
            .is_none()
    );
    let stored = harness
        .archive
        .select_by_id(task.id())
        .await
        .expect("lookup succeeds")
        .expect("activity archived");
    assert_eq!(stored, record);
    assert_eq!(stored.status(), ActivityStatus::Success);
    assert_eq!(stored.warning_count(), 2);
    assert_eq!(stored.execution_time_ms(), Some(60_000));
    assert!(stored.is_last());
    assert!(stored.main_is_last());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn repeated_analyses_keep_a_single_latest_row() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let harness = Harness::new();

    let component = ComponentId::new();
    let first = harness.claimed_task(component, 200).await;
    harness
        .finaliser(260)
        .finalise(&first, Some(component), ActivityOutcome::Success { warning_count: 0 })
        .await
        .expect("finalisation succeeds");
    let second = harness.claimed_task(component, 500).await;
    let failure = ActivityOutcome::Failed {
        error: ExecutionError::new("scanner crashed").with_kind("TIMEOUT"),
    };
    harness
        .finaliser(560)
        .finalise(&second, Some(component), failure)
        .await
        .expect("finalisation succeeds");

    let earlier = harness
        .archive
        .select_by_id(first.id())
        .await
        .expect("lookup succeeds")
        .expect("first run kept");
    assert!(!earlier.is_last());
    assert!(!earlier.main_is_last());

    let latest = harness
        .archive
        .select_by_id(second.id())
        .await
        .expect("lookup succeeds")
        .expect("second run kept");
    assert!(latest.is_last());
    assert_eq!(latest.status(), ActivityStatus::Failed);
    assert_eq!(
        harness
            .archive
            .count_last_by_status_and_main_component(ActivityStatus::Failed, Some(component))
            .await
            .expect("count succeeds"),
        1
    );
    assert_eq!(
        harness
            .archive
            .count_last_by_status_and_main_component(ActivityStatus::Success, Some(component))
            .await
            .expect("count succeeds"),
        0
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn duplicate_archive_insert_is_rejected() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let harness = Harness::new();

    let component = ComponentId::new();
    let task = harness.claimed_task(component, 200).await;
    let record = harness
        .finaliser(260)
        .finalise(&task, Some(component), ActivityOutcome::Success { warning_count: 0 })
        .await
        .expect("finalisation succeeds");

    let error = harness
        .archive
        .insert(&record)
        .await
        .expect_err("duplicate insert must fail");
    assert!(matches!(
        error,
        ArchiveRepositoryError::DuplicateActivity(id) if id == task.id()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn archive_listing_filters_and_paginates() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let harness = Harness::new();

    let component = ComponentId::new();
    let mut ids = Vec::new();
    for round in 0..3_i64 {
        let task = harness.claimed_task(component, 200 + round * 300).await;
        let record = harness
            .finaliser(260 + round * 300)
            .finalise(&task, Some(component), ActivityOutcome::Success { warning_count: 0 })
            .await
            .expect("finalisation succeeds");
        ids.push(record.id());
    }
    let elsewhere = harness.claimed_task(ComponentId::new(), 2_000).await;
    let cancelled = harness.claimed_task(component, 2_100).await;
    harness
        .queue
        .compare_and_swap(
            cancelled.id(),
            &conveyor::queue::domain::TaskTransition::release(FixedClock::at(2_150).0),
        )
        .await
        .expect("release succeeds");
    let requeued = harness
        .queue
        .select_by_id(cancelled.id())
        .await
        .expect("lookup succeeds")
        .expect("task still queued");
    assert_eq!(requeued.status(), TaskStatus::Pending);
    harness
        .finaliser(2_200)
        .finalise(&requeued, Some(component), ActivityOutcome::Canceled)
        .await
        .expect("cancellation archives");
    harness
        .finaliser(2_300)
        .finalise(&elsewhere, None, ActivityOutcome::Success { warning_count: 0 })
        .await
        .expect("finalisation succeeds");

    let query = ActivityQuery::new()
        .with_main_components(vec![component])
        .with_statuses(vec![ActivityStatus::Success]);
    let page = harness
        .archive
        .select_by_query(&query, Page::first(2))
        .await
        .expect("query succeeds");
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id(), ids[2]);
    assert_eq!(page[1].id(), ids[1]);
    assert_eq!(
        harness.archive.count_by_query(&query).await.expect("count succeeds"),
        3
    );

    let latest_only = harness
        .archive
        .select_by_query(
            &ActivityQuery::new()
                .with_main_components(vec![component])
                .only_latest(),
            Page::first(10),
        )
        .await
        .expect("query succeeds");
    assert_eq!(latest_only.len(), 1);
    assert_eq!(latest_only[0].id(), ids[2]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires CONVEYOR_TEST_DATABASE_URL"]
async fn purge_removes_only_records_older_than_cutoff() {
    let _guard = DB_LOCK.lock().await;
    truncate_tables();
    let harness = Harness::new();

    let component = ComponentId::new();
    let old = harness.claimed_task(component, 200).await;
    harness
        .finaliser(260)
        .finalise(&old, Some(component), ActivityOutcome::Success { warning_count: 0 })
        .await
        .expect("finalisation succeeds");
    let recent = harness.claimed_task(component, 5_000).await;
    harness
        .finaliser(5_060)
        .finalise(&recent, Some(component), ActivityOutcome::Success { warning_count: 0 })
        .await
        .expect("finalisation succeeds");

    let cutoff = Utc
        .timestamp_opt(1_000, 0)
        .single()
        .expect("valid timestamp");
    let purged = harness
        .finaliser(6_000)
        .purge_older_than(cutoff)
        .await
        .expect("purge succeeds");
    assert_eq!(purged, 1);
    assert!(
        harness
            .archive
            .select_by_id(old.id())
            .await
            .expect("lookup succeeds")
            .is_none()
    );
    assert!(
        harness
            .archive
            .select_by_id(recent.id())
            .await
            .expect("lookup succeeds")
            .is_some()
    );
}
