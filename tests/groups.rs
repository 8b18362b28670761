//! End-to-end tests for task groups: member admission, aggregate
//! outcomes, retry of failed groups, and removal cascades.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use common::{exec, failing_work, flaky_work, ok_work, wait_for_task};
use taskhive::{EventKind, ExecError, Task, TaskGroup};

#[tokio::test(start_paused = true)]
async fn test_group_completes_with_members() {
    let (exec, mut rx) = exec(4);

    let group = TaskGroup::builder()
        .label("batch")
        .task(Task::builder(ok_work()).label("m1").build())
        .task(Task::builder(ok_work()).label("m2").build())
        .build();

    let name = exec.add_group(group).await.unwrap();
    assert_eq!(name, "batch");
    exec.start_workers().await.unwrap();

    wait_for_task(&mut rx, EventKind::RunnerCompleted, "m1").await;
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "m2").await;
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "batch").await;
}

#[tokio::test(start_paused = true)]
async fn test_members_admitted_at_group_dispatch() {
    let (exec, mut rx) = exec(4);

    let group = TaskGroup::builder()
        .label("late")
        .add_event("member", |_ctx| async { Ok(()) })
        .build();
    exec.add_group(group).await.unwrap();

    // members are staged, not yet registered
    assert!(exec.inspect("member").await.is_err());

    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::TaskAdded, "member").await;
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "late").await;
    assert!(exec.inspect("member").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_empty_group_rejected() {
    let (exec, _rx) = exec(4);

    let err = exec
        .add_group(TaskGroup::builder().label("hollow").build())
        .await
        .unwrap_err();
    assert_eq!(err, ExecError::EmptyGroup { name: "hollow".into() });
}

#[tokio::test(start_paused = true)]
async fn test_group_fails_when_member_fails() {
    let (exec, mut rx) = exec(4);

    let group = TaskGroup::builder()
        .label("mixed")
        .task(Task::builder(ok_work()).label("good").build())
        .task(Task::builder(failing_work("boom")).label("bad").build())
        .build();
    exec.add_group(group).await.unwrap();
    exec.start_workers().await.unwrap();

    wait_for_task(&mut rx, EventKind::RunnerFailed, "bad").await;
    let failed = wait_for_task(&mut rx, EventKind::RunnerFailed, "mixed").await;
    let reason = failed.reason.unwrap();
    assert!(reason.contains("member(s) failed"));
    assert!(reason.contains("bad"));
    assert!(!reason.contains("good"));
}

#[tokio::test(start_paused = true)]
async fn test_group_runs_under_single_worker_budget() {
    // a waiting group holds a slot; the extra slot keeps members moving
    let (exec, mut rx) = exec(1);

    let group = TaskGroup::builder()
        .label("tight")
        .add_event("one", |_ctx| async { Ok(()) })
        .add_event("two", |_ctx| async { Ok(()) })
        .build();
    exec.add_group(group).await.unwrap();
    exec.start_workers().await.unwrap();

    wait_for_task(&mut rx, EventKind::RunnerCompleted, "tight").await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_of_member_reruns_failed_group() {
    let (exec, mut rx) = exec(4);

    let group = TaskGroup::builder()
        .label("recoverable")
        .task(Task::builder(flaky_work(1)).label("shaky").build())
        .task(Task::builder(ok_work()).label("steady").build())
        .build();
    exec.add_group(group).await.unwrap();
    exec.start_workers().await.unwrap();

    wait_for_task(&mut rx, EventKind::RunnerFailed, "recoverable").await;

    // retrying the member restarts the whole group
    exec.retry("shaky").await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "shaky").await;
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "recoverable").await;
}

#[tokio::test(start_paused = true)]
async fn test_group_retry_skips_completed_members() {
    let (exec, mut rx) = exec(4);

    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    let counting = Task::builder(taskhive::WorkFn::arc(move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }))
    .label("done-once")
    .build();

    let group = TaskGroup::builder()
        .label("partial")
        .task(counting)
        .task(Task::builder(flaky_work(1)).label("shaky").build())
        .build();
    exec.add_group(group).await.unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerFailed, "partial").await;

    exec.retry("partial").await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "partial").await;

    // the completed member was not re-run
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_group_waits_for_parent() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("setup").build())
        .await
        .unwrap();
    let group = TaskGroup::builder()
        .label("dependent")
        .add_event("m", |_ctx| async { Ok(()) })
        .wait_for("setup")
        .build();
    exec.add_group(group).await.unwrap();
    exec.start_workers().await.unwrap();

    let setup = wait_for_task(&mut rx, EventKind::RunnerCompleted, "setup").await;
    let group_started = wait_for_task(&mut rx, EventKind::RunnerStarted, "dependent").await;
    assert!(group_started.seq > setup.seq);
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "dependent").await;
}

#[tokio::test(start_paused = true)]
async fn test_remove_failed_group_cascades_to_members() {
    let (exec, mut rx) = exec(4);

    let group = TaskGroup::builder()
        .label("cleanup")
        .task(Task::builder(failing_work("boom")).label("culprit").build())
        .build();
    exec.add_group(group).await.unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerFailed, "cleanup").await;

    exec.remove("cleanup").await.unwrap();
    wait_for_task(&mut rx, EventKind::TaskRemoved, "culprit").await;
    wait_for_task(&mut rx, EventKind::TaskRemoved, "cleanup").await;
    assert!(exec.inspect("culprit").await.is_err());
    assert!(exec.inspect("cleanup").await.is_err());
}
