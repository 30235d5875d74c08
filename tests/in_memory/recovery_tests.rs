//! Crash recovery flows: orphan requeueing and stale claim detection.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use conveyor::queue::{
    adapters::memory::InMemoryQueueRepository,
    domain::{QueuedTask, TaskStatus, WorkerId, task_types},
    ports::QueueRepository,
    services::{LivenessReconciler, SubmitTaskRequest},
};
use rstest::rstest;

use super::helpers::{FixedClock, gate_at, queue_repo, submit_at};

fn reconciler_at(
    repository: &Arc<InMemoryQueueRepository>,
    secs: i64,
) -> LivenessReconciler<InMemoryQueueRepository, FixedClock> {
    LivenessReconciler::new(Arc::clone(repository), Arc::new(FixedClock::at(secs)))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_sweep_requeues_claims_and_preserves_fifo_order(
    queue_repo: Arc<InMemoryQueueRepository>,
) {
    let first = submit_at(&queue_repo, 100, SubmitTaskRequest::new(task_types::REPORT)).await;
    let second = submit_at(&queue_repo, 200, SubmitTaskRequest::new(task_types::REPORT)).await;
    let gate = gate_at(&queue_repo, 300, Vec::new());
    gate.claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    gate.claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");

    // Simulated restart: no worker is known anymore.
    let reset = reconciler_at(&queue_repo, 400)
        .reset_tasks_with_unknown_workers(&HashSet::new())
        .await
        .expect("reset succeeds");
    assert_eq!(reset, 2);

    let pending = queue_repo
        .select_pending_in_asc_order()
        .await
        .expect("listing succeeds");
    assert_eq!(
        pending.iter().map(QueuedTask::id).collect::<Vec<_>>(),
        vec![first.id(), second.id()]
    );
    assert!(pending.iter().all(|task| task.started_at().is_none()));

    // The requeued head is claimable again.
    let reclaimed = gate_at(&queue_repo, 500, Vec::new())
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    assert_eq!(reclaimed.id(), first.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn partial_sweep_spares_live_workers(queue_repo: Arc<InMemoryQueueRepository>) {
    submit_at(&queue_repo, 100, SubmitTaskRequest::new(task_types::REPORT)).await;
    submit_at(&queue_repo, 200, SubmitTaskRequest::new(task_types::REPORT)).await;
    let live_worker = WorkerId::new();
    let gate = gate_at(&queue_repo, 300, Vec::new());
    let live_task = gate
        .claim_next(live_worker)
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");
    gate.claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");

    let reset = reconciler_at(&queue_repo, 400)
        .reset_tasks_with_unknown_workers(&HashSet::from([live_worker]))
        .await
        .expect("reset succeeds");
    assert_eq!(reset, 1);

    let reloaded = queue_repo
        .select_by_id(live_task.id())
        .await
        .expect("lookup succeeds")
        .expect("task still queued");
    assert_eq!(reloaded.status(), TaskStatus::InProgress);
    assert_eq!(reloaded.worker(), Some(live_worker));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn wornout_claims_surface_after_the_staleness_window(
    queue_repo: Arc<InMemoryQueueRepository>,
) {
    submit_at(&queue_repo, 100, SubmitTaskRequest::new(task_types::REPORT)).await;
    let claimed = gate_at(&queue_repo, 200, Vec::new())
        .claim_next(WorkerId::new())
        .await
        .expect("claim succeeds")
        .expect("queue has eligible work");

    let early = reconciler_at(&queue_repo, 500)
        .select_wornout(Duration::seconds(600))
        .await
        .expect("selection succeeds");
    assert!(early.is_empty());

    let late = reconciler_at(&queue_repo, 1_000)
        .select_wornout(Duration::seconds(600))
        .await
        .expect("selection succeeds");
    assert_eq!(late.iter().map(QueuedTask::id).collect::<Vec<_>>(), vec![
        claimed.id()
    ]);
}
