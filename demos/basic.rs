//! Minimal end-to-end run: two tasks, a retry policy, and an event feed.
//!
//! Run with: `cargo run --example basic`

use std::time::Duration;

use taskhive::{Config, EventKind, Executor, RetryPolicy, TaskBuilder};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let exec = Executor::new(Config::default());
    let mut events = exec.subscribe();

    let feed = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            match ev.kind {
                EventKind::RunnerStarted => {
                    println!("[{}] started (attempt {})", ev.task.unwrap(), ev.attempt.unwrap());
                }
                EventKind::RunnerCompleted => println!("[{}] completed", ev.task.unwrap()),
                EventKind::RunnerFailed => {
                    println!("[{}] failed: {}", ev.task.unwrap(), ev.reason.unwrap());
                }
                EventKind::SystemIdle => {
                    println!("all quiet");
                    break;
                }
                _ => {}
            }
        }
    });

    let greet = TaskBuilder::from_fn(|ctx| async move {
        ctx.log("hello from a worker");
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    })
    .label("greet")
    .build();

    let flaky = TaskBuilder::from_fn(|_ctx| async move {
        Err(taskhive::TaskError::fail("transient hiccup"))
    })
    .label("flaky")
    .retry(RetryPolicy::fixed(2, 1))
    .build();

    exec.add_task(greet).await?;
    exec.add_task(flaky).await?;
    exec.start_workers().await?;

    feed.await?;
    exec.shutdown().await?;
    Ok(())
}
