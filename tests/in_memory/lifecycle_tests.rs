//! End-to-end lifecycle flows: submit, claim, finalise, query.

use std::sync::Arc;

use conveyor::archive::{
    adapters::memory::InMemoryArchiveRepository,
    domain::{ActivityOutcome, ActivityQuery, ActivityStatus, ExecutionError},
    ports::ArchiveRepository,
    services::TaskFinaliser,
};
use conveyor::queue::{
    adapters::memory::InMemoryQueueRepository,
    domain::{ComponentId, EntityId, Page, SubmitterId, TaskStatus, WorkerId, task_types},
    ports::QueueRepository,
    services::SubmitTaskRequest,
};
use rstest::rstest;

use super::helpers::{FixedClock, archive_repo, gate_at, queue_repo, submit_at};

fn finaliser_at(
    queue: &Arc<InMemoryQueueRepository>,
    archive: &Arc<InMemoryArchiveRepository>,
    secs: i64,
) -> TaskFinaliser<InMemoryQueueRepository, InMemoryArchiveRepository, FixedClock> {
    TaskFinaliser::new(
        Arc::clone(queue),
        Arc::clone(archive),
        Arc::new(FixedClock::at(secs)),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn full_round_trip_leaves_one_archive_row_and_an_empty_queue(
    queue_repo: Arc<InMemoryQueueRepository>,
    archive_repo: Arc<InMemoryArchiveRepository>,
) {
    let component = ComponentId::new();
    let entity = EntityId::new();
    let main = ComponentId::new();
    let submitted = submit_at(
        &queue_repo,
        100,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(component, entity)
            .with_submitter(SubmitterId::new())
            .with_characteristic("branch", "main"),
    )
    .await;

    let worker = WorkerId::new();
    let claimed = gate_at(&queue_repo, 200, Vec::new())
        .claim_next(worker)
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    assert_eq!(claimed.id(), submitted.id());
    assert_eq!(claimed.status(), TaskStatus::InProgress);

    let record = finaliser_at(&queue_repo, &archive_repo, 245)
        .finalise(
            &claimed,
            Some(main),
            ActivityOutcome::Success { warning_count: 1 },
        )
        .await
        .expect("finalisation succeeds");

    let queue_rows = queue_repo
        .select_all_in_asc_order()
        .await
        .expect("queue listing");
    assert!(queue_rows.is_empty());

    let archived = archive_repo
        .select_by_id(submitted.id())
        .await
        .expect("lookup succeeds")
        .expect("record archived");
    assert_eq!(archived, record);
    assert_eq!(archived.status(), ActivityStatus::Success);
    assert_eq!(archived.worker(), Some(worker));
    assert_eq!(archived.submitter(), submitted.submitter());
    assert_eq!(archived.submitted_at(), submitted.created_at());
    assert_eq!(archived.execution_time_ms(), Some(45_000));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn characteristics_survive_until_the_task_leaves_the_queue(
    queue_repo: Arc<InMemoryQueueRepository>,
    archive_repo: Arc<InMemoryArchiveRepository>,
) {
    let task = submit_at(
        &queue_repo,
        100,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(ComponentId::new(), EntityId::new())
            .with_characteristic("pullRequest", "42"),
    )
    .await;

    let claimed = gate_at(&queue_repo, 200, Vec::new())
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    let tags = queue_repo
        .select_characteristics(task.id())
        .await
        .expect("characteristics load");
    assert_eq!(tags.len(), 1);

    finaliser_at(&queue_repo, &archive_repo, 300)
        .finalise(&claimed, None, ActivityOutcome::Success { warning_count: 0 })
        .await
        .expect("finalisation succeeds");

    let tags = queue_repo
        .select_characteristics(task.id())
        .await
        .expect("characteristics load");
    assert!(tags.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_run_is_queryable_from_the_archive(
    queue_repo: Arc<InMemoryQueueRepository>,
    archive_repo: Arc<InMemoryArchiveRepository>,
) {
    let main = ComponentId::new();
    submit_at(
        &queue_repo,
        100,
        SubmitTaskRequest::new(task_types::REPORT)
            .with_subject(ComponentId::new(), EntityId::new()),
    )
    .await;
    let claimed = gate_at(&queue_repo, 200, Vec::new())
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    finaliser_at(&queue_repo, &archive_repo, 300)
        .finalise(
            &claimed,
            Some(main),
            ActivityOutcome::Failed {
                error: ExecutionError::new("scanner payload unreadable").with_kind("PARSE"),
            },
        )
        .await
        .expect("finalisation succeeds");

    let query = ActivityQuery::new()
        .with_main_components(vec![main])
        .with_statuses(vec![ActivityStatus::Failed])
        .only_latest();
    let listed = archive_repo
        .select_by_query(&query, Page::first(10))
        .await
        .expect("query succeeds");

    assert_eq!(listed.len(), 1);
    let error = listed[0].error().expect("failed record keeps its error");
    assert_eq!(error.message, "scanner payload unreadable");
    assert_eq!(error.kind.as_deref(), Some("PARSE"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_analyses_keep_one_latest_row_per_component(
    queue_repo: Arc<InMemoryQueueRepository>,
    archive_repo: Arc<InMemoryArchiveRepository>,
) {
    let component = ComponentId::new();
    let entity = EntityId::new();
    let main = ComponentId::new();
    for round in 0..3_i64 {
        let base = 1_000 * (round + 1);
        submit_at(
            &queue_repo,
            base,
            SubmitTaskRequest::new(task_types::REPORT).with_subject(component, entity),
        )
        .await;
        let claimed = gate_at(&queue_repo, base + 100, Vec::new())
            .claim_next(WorkerId::new())
            .await
            .expect("claim succeeds")
            .expect("queue has eligible work");
        finaliser_at(&queue_repo, &archive_repo, base + 200)
            .finalise(
                &claimed,
                Some(main),
                ActivityOutcome::Success { warning_count: 0 },
            )
            .await
            .expect("finalisation succeeds");
    }

    let history = archive_repo
        .select_by_query(
            &ActivityQuery::new().with_component(component),
            Page::first(10),
        )
        .await
        .expect("query succeeds");
    assert_eq!(history.len(), 3);

    let latest: Vec<_> = history.iter().filter(|record| record.is_last()).collect();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].executed_at(), FixedClock::at(3_200).0);
}
