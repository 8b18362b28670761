//! # taskhive
//!
//! **Taskhive** is a concurrent task queue manager for Rust.
//!
//! It runs async tasks and task groups through a bounded worker pool with
//! FIFO dispatch, dependency gating, admission predicates, retry policies,
//! and lifecycle callbacks. The crate is designed as a building block for
//! applications that need supervised background work with a live status
//! surface.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │     Task     │   │     Task     │   │  TaskGroup   │
//!     │(user work #1)│   │(user work #2)│   │ (+ members)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ add_task         ▼ add_task         ▼ add_group
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Executor (cloneable handle)                                      │
//! │      every call becomes a Msg on an unbounded channel             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Core (single coordinator task, owns ALL state)                   │
//! │  - Registry (arena of units, names, dependency links)             │
//! │  - ReadyQueue (FIFO heap + deferred store)                        │
//! │  - StatusTracker (per-state counters, idle debounce)              │
//! │  - gate: predicate check, parent check                            │
//! │  - timers: retry delays, predicate ticks                          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼ spawn            ▼ spawn            ▼ spawn
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ task worker  │   │ task worker  │   │ group runner │
//!     │ (one attempt)│   │ (one attempt)│   │(waits members)│
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ TaskOutcome      │ TaskOutcome      │ GroupOutcome
//!      └──────────────────┴───────┬──────────┘
//!                                 ▼ (back to the Core channel)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │  TaskAdded / RunnerStarted / RunnerFailed / StatusUpdated / ...   │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                            subscribe() receivers
//! ```
//!
//! ### Unit lifecycle
//! ```text
//! initialized ──► waiting ──► [gate] ──► running ──► completed
//!                    ▲           │           │
//!                    │           ▼           ▼ (failure)
//!                    │        blocked     retrying ──► waiting (delay elapsed)
//!                    │           │           │
//!                    └───────────┘           ▼ (budget exhausted)
//!                 (parent done /           failed ──► waiting ("Reset & Retry")
//!                  predicate pass)
//!
//! deleted: reachable from any state except running / retrying (remove),
//!          or from queued states on shutdown.
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types                                 |
//! |-----------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Tasks**       | Async work with data bags, progress, and per-task options.    | [`Task`], [`Work`], [`WorkFn`]            |
//! | **Groups**      | Batches that run members concurrently and settle together.    | [`TaskGroup`], [`GroupBuilder`]           |
//! | **Dependencies**| `wait_for` gating with failure cascades.                      | [`TaskBuilder::wait_for`]                 |
//! | **Predicates**  | Hold dispatch until an external condition passes.             | [`TaskPredicate`]                         |
//! | **Retries**     | Budgeted retries with fixed/linear/exponential delays.        | [`RetryPolicy`], [`DelayStrategy`]        |
//! | **Callbacks**   | Lifecycle hooks with fire-once semantics.                     | [`HookKind`], [`UnitView`]                |
//! | **Events**      | Broadcast stream with sequence numbers and status counts.     | [`Event`], [`EventKind`], [`Counts`]      |
//! | **Errors**      | Typed errors for the control surface and for work failures.   | [`ExecError`], [`TaskError`]              |
//!
//! ## Example
//! ```rust
//! use taskhive::{Config, Executor, RetryPolicy, TaskBuilder};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let exec = Executor::new(Config::default());
//!
//!     let fetch = TaskBuilder::from_fn(|ctx| async move {
//!         ctx.progress(50);
//!         ctx.data().insert("result", serde_json::json!(42));
//!         Ok(())
//!     })
//!     .label("fetch")
//!     .retry(RetryPolicy::fixed(3, 1))
//!     .build();
//!
//!     let report = TaskBuilder::from_fn(|_ctx| async move { Ok(()) })
//!         .wait_for("fetch")
//!         .build();
//!
//!     exec.add_task(fetch).await?;
//!     exec.add_task(report).await?;
//!     exec.start_workers().await?;
//!
//!     exec.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod policies;
mod queue;
mod tasks;

// ---- Public re-exports ----

pub use config::{Config, Settings, DEFAULT_IDLE_DEBOUNCE, DEFAULT_MAX_WORKERS};
pub use core::Executor;
pub use error::{ExecError, TaskError};
pub use events::{Bus, Counts, Event, EventKind};
pub use policies::{
    DelayStrategy, RetryCondition, RetryDecision, RetryPolicy, EXPONENTIAL_DELAY_CAP,
    LINEAR_DELAY_CAP,
};
pub use tasks::{
    format_duration, visible_actions, ActionFn, ActionVisibility, Callback, CallbackSet,
    GroupBuilder, Hook, HookKind, PredicateFn, PredicateOutcome, ProgressBarOptions, ProgressMode,
    State, StateMachine, StateObserver, StateRecord, Task, TaskAction, TaskBase, TaskBuilder,
    TaskContext, TaskGroup, TaskPredicate, UnitView, Work, WorkFn, WorkRef, DataBag,
    PREDICATE_INTERVAL, PREDICATE_MAX_RETRIES,
};
