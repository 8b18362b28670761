//! Shared helpers for executor integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use taskhive::{Config, Event, EventKind, Executor, TaskError, WorkFn, WorkRef};

/// Executor with a subscribed event receiver.
pub fn exec(max_workers: usize) -> (Executor, broadcast::Receiver<Event>) {
    let config = Config {
        max_workers,
        idle_debounce: Duration::from_millis(100),
        ..Config::default()
    };
    let exec = Executor::new(config);
    let rx = exec.subscribe();
    (exec, rx)
}

/// Waits for the next event of `kind`, skipping everything else.
pub async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    wait_matching(rx, |ev| ev.kind == kind).await
}

/// Waits for the next event of `kind` attributed to `task`.
pub async fn wait_for_task(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    task: &str,
) -> Event {
    wait_matching(rx, |ev| {
        ev.kind == kind && ev.task.as_deref() == Some(task)
    })
    .await
}

async fn wait_matching(
    rx: &mut broadcast::Receiver<Event>,
    matches: impl Fn(&Event) -> bool,
) -> Event {
    let fut = async {
        loop {
            match rx.recv().await {
                Ok(ev) if matches(&ev) => return ev,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), fut)
        .await
        .unwrap_or_else(|_| panic!("expected event did not arrive"))
}

/// Work that succeeds immediately.
pub fn ok_work() -> WorkRef {
    WorkFn::arc(|_ctx| async { Ok(()) })
}

/// Work that always fails with the given message.
pub fn failing_work(msg: &str) -> WorkRef {
    let msg = msg.to_string();
    WorkFn::arc(move |_ctx| {
        let msg = msg.clone();
        async move { Err(TaskError::fail(msg)) }
    })
}

/// Work that fails the first `n` attempts and then succeeds.
pub fn flaky_work(n: u32) -> WorkRef {
    let failures = Arc::new(AtomicU32::new(n));
    WorkFn::arc(move |_ctx| {
        let failures = Arc::clone(&failures);
        async move {
            if failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
                .is_ok()
            {
                Err(TaskError::fail("still warming up"))
            } else {
                Ok(())
            }
        }
    })
}
