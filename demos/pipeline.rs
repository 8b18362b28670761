//! A fetch / convert / publish pipeline built from `wait_for` links and
//! one parallel group in the middle.
//!
//! Run with: `cargo run --example pipeline`

use serde_json::json;
use taskhive::{Config, EventKind, Executor, TaskBuilder, TaskGroup};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let exec = Executor::new(Config { max_workers: 2, ..Config::default() });
    let mut events = exec.subscribe();

    let fetch = TaskBuilder::from_fn(|ctx| async move {
        ctx.progress(100);
        ctx.data().insert("records", json!(128));
        Ok(())
    })
    .label("fetch")
    .build();

    // both converters run in parallel once `fetch` completes
    let convert = TaskGroup::builder()
        .label("convert")
        .wait_for("fetch")
        .add_event("convert-audio", |ctx| async move {
            ctx.log("transcoding audio");
            Ok(())
        })
        .add_event("convert-video", |ctx| async move {
            ctx.log("transcoding video");
            Ok(())
        })
        .build();

    let publish = TaskBuilder::from_fn(|ctx| async move {
        ctx.log("publishing results");
        Ok(())
    })
    .label("publish")
    .wait_for("convert")
    .build();

    exec.add_task(fetch).await?;
    exec.add_group(convert).await?;
    exec.add_task(publish).await?;
    exec.start_workers().await?;

    while let Ok(ev) = events.recv().await {
        if ev.kind == EventKind::RunnerCompleted && ev.task.as_deref() == Some("publish") {
            break;
        }
    }

    let snapshot = exec.inspect("publish").await?;
    println!("publish state: {}", snapshot["state"]["current"]);

    exec.shutdown().await?;
    Ok(())
}
