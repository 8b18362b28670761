//! End-to-end tests for the executor: admission, dispatch, dependencies,
//! retries, predicates, removal, actions, and shutdown.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{exec, failing_work, flaky_work, ok_work, wait_for, wait_for_task};
use taskhive::{ActionVisibility, EventKind, ExecError, RetryPolicy, State, Task, WorkFn};

#[tokio::test(start_paused = true)]
async fn test_task_runs_to_completion() {
    let (exec, mut rx) = exec(4);

    let name = exec
        .add_task(Task::builder(ok_work()).label("solo").build())
        .await
        .unwrap();
    assert_eq!(name, "solo");
    exec.start_workers().await.unwrap();

    let started = wait_for_task(&mut rx, EventKind::RunnerStarted, "solo").await;
    assert_eq!(started.attempt, Some(1));
    wait_for_task(&mut rx, EventKind::TaskFinished, "solo").await;
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "solo").await;
}

#[tokio::test(start_paused = true)]
async fn test_unlabeled_tasks_get_sequential_names() {
    let (exec, _rx) = exec(4);

    let a = exec.add_task(Task::builder(ok_work()).build()).await.unwrap();
    let b = exec.add_task(Task::builder(ok_work()).build()).await.unwrap();
    assert_eq!(a, "Task-1");
    assert_eq!(b, "Task-2");
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_label_rejected() {
    let (exec, _rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("dup").build())
        .await
        .unwrap();
    let err = exec
        .add_task(Task::builder(ok_work()).label("dup").build())
        .await
        .unwrap_err();
    assert_eq!(err, ExecError::DuplicateAdmission { name: "dup".into() });
}

#[tokio::test(start_paused = true)]
async fn test_add_does_not_dispatch_until_started() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("parked").build())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    while let Ok(ev) = rx.try_recv() {
        assert_ne!(ev.kind, EventKind::RunnerStarted);
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_worker_preserves_admission_order() {
    let (exec, mut rx) = exec(1);

    for label in ["first", "second", "third"] {
        exec.add_task(Task::builder(ok_work()).label(label).build())
            .await
            .unwrap();
    }
    exec.start_workers().await.unwrap();

    let mut finished = Vec::new();
    while finished.len() < 3 {
        let ev = wait_for(&mut rx, EventKind::RunnerCompleted).await;
        finished.push(ev.task.unwrap().to_string());
    }
    assert_eq!(finished, ["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_gates_on_parent_completion() {
    let (exec, mut rx) = exec(4);

    let parent = Task::builder(WorkFn::arc(|_ctx| async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }))
    .label("parent")
    .build();
    let child = Task::builder(ok_work()).label("child").wait_for("parent").build();

    exec.add_task(parent).await.unwrap();
    exec.add_task(child).await.unwrap();
    exec.start_workers().await.unwrap();

    let parent_done = wait_for_task(&mut rx, EventKind::RunnerCompleted, "parent").await;
    let child_started = wait_for_task(&mut rx, EventKind::RunnerStarted, "child").await;
    assert!(child_started.seq > parent_done.seq);
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "child").await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_parent_rejected_at_admission() {
    let (exec, _rx) = exec(4);

    let err = exec
        .add_task(Task::builder(ok_work()).wait_for("ghost").build())
        .await
        .unwrap_err();
    assert_eq!(err, ExecError::NotFound { name: "ghost".into() });
}

#[tokio::test(start_paused = true)]
async fn test_parent_failure_cascades_to_children() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(failing_work("boom")).label("parent").build())
        .await
        .unwrap();
    exec.add_task(Task::builder(ok_work()).label("child").wait_for("parent").build())
        .await
        .unwrap();
    exec.add_task(Task::builder(ok_work()).label("grandchild").wait_for("child").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();

    let child_failed = wait_for_task(&mut rx, EventKind::RunnerFailed, "child").await;
    assert!(child_failed.reason.unwrap().contains("parent failed"));
    let grandchild = wait_for_task(&mut rx, EventKind::RunnerFailed, "grandchild").await;
    assert!(grandchild.reason.unwrap().contains("parent failed"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_until_success() {
    let (exec, mut rx) = exec(4);

    let task = Task::builder(flaky_work(2))
        .label("flaky")
        .retry(RetryPolicy::fixed(3, 1))
        .build();
    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();

    wait_for_task(&mut rx, EventKind::RunnerCompleted, "flaky").await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted_fails() {
    let (exec, mut rx) = exec(4);

    let task = Task::builder(failing_work("always"))
        .label("hopeless")
        .retry(RetryPolicy::fixed(2, 1))
        .build();
    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();

    // initial attempt plus two retries
    let failed = wait_for_task(&mut rx, EventKind::RunnerFailed, "hopeless").await;
    assert_eq!(failed.attempt, Some(3));
    assert!(failed.reason.unwrap().contains("always"));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_work_is_isolated() {
    let (exec, mut rx) = exec(4);

    let task = Task::builder(WorkFn::arc(|_ctx| async { panic!("kaboom") }))
        .label("panicky")
        .build();
    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();

    let failed = wait_for_task(&mut rx, EventKind::RunnerFailed, "panicky").await;
    assert!(failed.reason.unwrap().contains("kaboom"));

    // the executor keeps working afterwards
    exec.add_task(Task::builder(ok_work()).label("after").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "after").await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_retry_requeues_failed_task() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(flaky_work(1)).label("once").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerFailed, "once").await;

    exec.retry("once").await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "once").await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_retry_requeues_failed_dependents() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(flaky_work(1)).label("root").build())
        .await
        .unwrap();
    exec.add_task(Task::builder(ok_work()).label("leaf").wait_for("root").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerFailed, "leaf").await;

    exec.retry("root").await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "root").await;
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "leaf").await;
}

#[tokio::test(start_paused = true)]
async fn test_remove_waiting_task() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("doomed").build())
        .await
        .unwrap();
    exec.remove("doomed").await.unwrap();
    wait_for_task(&mut rx, EventKind::TaskRemoved, "doomed").await;

    let err = exec.inspect("doomed").await.unwrap_err();
    assert_eq!(err, ExecError::NotFound { name: "doomed".into() });
}

#[tokio::test(start_paused = true)]
async fn test_remove_cascades_to_dependents() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("root").build())
        .await
        .unwrap();
    exec.add_task(Task::builder(ok_work()).label("leaf").wait_for("root").build())
        .await
        .unwrap();

    exec.remove("root").await.unwrap();
    wait_for_task(&mut rx, EventKind::TaskRemoved, "leaf").await;
    assert!(exec.inspect("leaf").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_remove_running_task_refused() {
    let (exec, mut rx) = exec(4);

    let gate = Arc::new(tokio::sync::Notify::new());
    let release = Arc::clone(&gate);
    let task = Task::builder(WorkFn::arc(move |_ctx| {
        let gate = Arc::clone(&gate);
        async move {
            gate.notified().await;
            Ok(())
        }
    }))
    .label("busy")
    .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerStarted, "busy").await;

    let err = exec.remove("busy").await.unwrap_err();
    assert_eq!(
        err,
        ExecError::NotRemovable { name: "busy".into(), state: State::Running }
    );

    release.notify_one();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "busy").await;
}

#[tokio::test(start_paused = true)]
async fn test_predicate_holds_until_condition_passes() {
    let (exec, mut rx) = exec(4);

    let checks = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&checks);
    let task = Task::builder(ok_work())
        .label("gated")
        .predicate(
            move || counter.fetch_add(1, Ordering::SeqCst) >= 3,
            10,
            Duration::from_millis(10),
        )
        .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();

    wait_for_task(&mut rx, EventKind::RunnerCompleted, "gated").await;
    assert!(checks.load(Ordering::SeqCst) >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_predicate_budget_exhausted_fails() {
    let (exec, mut rx) = exec(4);

    let task = Task::builder(ok_work())
        .label("never")
        .predicate(|| false, 2, Duration::from_millis(10))
        .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();

    let failed = wait_for_task(&mut rx, EventKind::RunnerFailed, "never").await;
    assert!(failed.reason.unwrap().contains("predicate"));
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_callbacks_fire() {
    let (exec, mut rx) = exec(4);

    let starts = Arc::new(AtomicU32::new(0));
    let finishes = Arc::new(AtomicU32::new(0));
    let on_start = Arc::clone(&starts);
    let on_finish = Arc::clone(&finishes);

    let task = Task::builder(flaky_work(1))
        .label("observed")
        .retry(RetryPolicy::fixed(2, 1))
        .on_start(move |_view| {
            on_start.fetch_add(1, Ordering::SeqCst);
        })
        .on_finish(move |_view| {
            on_finish.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "observed").await;

    // on_start is fire-once; retries do not re-trigger it
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(finishes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_action_visibility_follows_state() {
    let (exec, mut rx) = exec(4);

    let opened = Arc::new(AtomicBool::new(false));
    let on_open = Arc::clone(&opened);
    let task = Task::builder(ok_work())
        .label("download")
        .action("open", ActionVisibility::OnCompleted, move |_view| {
            on_open.store(true, Ordering::SeqCst);
        })
        .build();

    exec.add_task(task).await.unwrap();

    let err = exec.run_action("download", "open").await.unwrap_err();
    assert_eq!(
        err,
        ExecError::ActionUnavailable { task: "download".into(), action: "open".into() }
    );

    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "download").await;

    exec.run_action("download", "open").await.unwrap();
    assert!(opened.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_progress_reported_on_bus() {
    let (exec, mut rx) = exec(4);

    let task = Task::builder(WorkFn::arc(|ctx| async move {
        ctx.progress(42);
        Ok(())
    }))
    .label("reporting")
    .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();

    let progress = wait_for_task(&mut rx, EventKind::ProgressUpdated, "reporting").await;
    assert_eq!(progress.value, Some(42));
}

#[tokio::test(start_paused = true)]
async fn test_status_counts_track_completion() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("counted").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "counted").await;

    let status = wait_for(&mut rx, EventKind::StatusUpdated).await;
    let counts = status.counts.unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retrying_parent_keeps_child_blocked_once() {
    let (exec, mut rx) = exec(4);

    // a: fails once then succeeds under retry; b waits for a; c is independent
    let a = Task::builder(flaky_work(1))
        .label("a")
        .retry(RetryPolicy::fixed(1, 1))
        .build();
    exec.add_task(a).await.unwrap();
    exec.add_task(Task::builder(ok_work()).label("b").wait_for("a").build())
        .await
        .unwrap();
    exec.add_task(Task::builder(ok_work()).label("c").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();

    for name in ["c", "a", "b"] {
        wait_for_task(&mut rx, EventKind::RunnerCompleted, name).await;
    }

    // b stayed parked through a's retry: exactly one blocked entry
    let snapshot = exec.inspect("b").await.unwrap();
    let history = snapshot["state"]["history"].as_array().unwrap();
    let blocked = history.iter().filter(|r| r["state"] == "blocked").count();
    assert_eq!(blocked, 1);
    assert_eq!(snapshot["state"]["current"], "completed");

    let a_snapshot = exec.inspect("a").await.unwrap();
    assert_eq!(a_snapshot["state"]["current"], "completed");
}

#[tokio::test(start_paused = true)]
async fn test_on_start_observes_pre_running_state() {
    let (exec, mut rx) = exec(4);

    let seen = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&seen);
    let task = Task::builder(ok_work())
        .label("watched")
        .on_start(move |view| {
            *sink.lock().unwrap() = Some(view.state);
        })
        .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "watched").await;

    assert_eq!(*seen.lock().unwrap(), Some(State::Waiting));
}

#[tokio::test(start_paused = true)]
async fn test_system_idle_after_work_settles() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("only").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "only").await;

    wait_for(&mut rx, EventKind::SystemIdle).await;
}

#[tokio::test(start_paused = true)]
async fn test_new_work_defers_system_idle() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("first").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "first").await;

    // admitted inside the debounce window, before the idle timer elapses
    exec.add_task(Task::builder(ok_work()).label("second").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();

    // the first idle notification must come after the second task settles
    let mut second_done = false;
    loop {
        let ev = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("event stream stalled")
            .expect("event bus closed");
        match ev.kind {
            EventKind::RunnerCompleted if ev.task.as_deref() == Some("second") => {
                second_done = true;
            }
            EventKind::SystemIdle => {
                assert!(second_done, "went idle with work still pending");
                break;
            }
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_inspect_exposes_state_history() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("traced").comment("a test task").build())
        .await
        .unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerCompleted, "traced").await;

    let snapshot = exec.inspect("traced").await.unwrap();
    assert_eq!(snapshot["name"], "traced");
    assert_eq!(snapshot["comment"], "a test task");
    assert_eq!(snapshot["kind"], "task");
}

#[tokio::test(start_paused = true)]
async fn test_set_max_workers_unblocks_queue() {
    let (exec, mut rx) = exec(1);

    let gate = Arc::new(tokio::sync::Notify::new());
    for label in ["a", "b", "c"] {
        let gate = Arc::clone(&gate);
        let task = Task::builder(WorkFn::arc(move |_ctx| {
            let gate = Arc::clone(&gate);
            async move {
                gate.notified().await;
                Ok(())
            }
        }))
        .label(label)
        .build();
        exec.add_task(task).await.unwrap();
    }
    exec.start_workers().await.unwrap();

    exec.set_max_workers(3).await.unwrap();
    for label in ["a", "b", "c"] {
        wait_for_task(&mut rx, EventKind::RunnerStarted, label).await;
        gate.notify_one();
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_queued_work() {
    let (exec, mut rx) = exec(4);

    exec.add_task(Task::builder(ok_work()).label("queued").build())
        .await
        .unwrap();
    exec.shutdown().await.unwrap();

    let removed = wait_for_task(&mut rx, EventKind::TaskRemoved, "queued").await;
    assert_eq!(removed.reason.as_deref(), Some("shutdown"));

    let err = exec
        .add_task(Task::builder(ok_work()).label("late").build())
        .await
        .unwrap_err();
    assert_eq!(err, ExecError::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_running_work() {
    let (exec, mut rx) = exec(4);

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    let task = Task::builder(WorkFn::arc(move |_ctx| {
        let flag = Arc::clone(&flag);
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }
    }))
    .label("inflight")
    .build();

    exec.add_task(task).await.unwrap();
    exec.start_workers().await.unwrap();
    wait_for_task(&mut rx, EventKind::RunnerStarted, "inflight").await;

    exec.shutdown().await.unwrap();
    assert!(done.load(Ordering::SeqCst));
}
