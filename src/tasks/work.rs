//! # User work: the `Work` trait and its closure adapter.
//!
//! [`Work`] is the async payload of a task. Implement it directly for
//! stateful work, or use [`WorkFn`] to wrap a closure that produces a
//! fresh future per attempt.
//!
//! Each attempt receives a [`TaskContext`] with the unit's identity, the
//! shared [`DataBag`], and a progress emitter.
//!
//! ## Example
//! ```rust
//! use taskhive::{TaskContext, TaskError, WorkFn, WorkRef};
//!
//! let work: WorkRef = WorkFn::arc(|ctx: TaskContext| async move {
//!     ctx.log("doing work");
//!     ctx.progress(50);
//!     Ok::<_, TaskError>(())
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

/// Shared key/value store attached to a unit.
///
/// Visible to user work, callbacks, and actions. Cheap to clone; all
/// clones see the same map.
#[derive(Clone, Default)]
pub struct DataBag(Arc<Mutex<Map<String, Value>>>);

impl DataBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().ok().and_then(|m| m.get(key).cloned())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        if let Ok(mut m) = self.0.lock() {
            m.insert(key.into(), value);
        }
    }

    /// Snapshot of the whole bag as a JSON object.
    pub fn snapshot(&self) -> Value {
        self.0
            .lock()
            .map(|m| Value::Object(m.clone()))
            .unwrap_or(Value::Null)
    }
}

impl fmt::Debug for DataBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataBag({} keys)", self.0.lock().map(|m| m.len()).unwrap_or(0))
    }
}

/// Execution context handed to each work attempt.
#[derive(Clone)]
pub struct TaskContext {
    pub(crate) id: Uuid,
    pub(crate) name: Arc<str>,
    pub(crate) data: DataBag,
    pub(crate) bus: Bus,
}

impl TaskContext {
    /// Unique id of the unit being executed.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the unit being executed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared data bag of the unit.
    pub fn data(&self) -> &DataBag {
        &self.data
    }

    /// Publishes a progress value on the event bus.
    pub fn progress(&self, value: u32) {
        self.bus.publish(
            Event::new(EventKind::ProgressUpdated)
                .with_task(Arc::clone(&self.name))
                .with_value(value),
        );
    }

    /// Emits a structured log line attributed to the unit.
    pub fn log(&self, msg: impl AsRef<str>) {
        tracing::info!(task = %self.name, "{}", msg.as_ref());
    }
}

/// Async payload of a task.
#[async_trait]
pub trait Work: Send + Sync {
    /// Runs one attempt. Called once per dispatch, including retries.
    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError>;
}

/// Shared handle to user work.
pub type WorkRef = Arc<dyn Work>;

/// Function-backed [`Work`] implementation.
///
/// Wraps a closure that *creates* a new future per attempt, so attempts
/// never share hidden mutable state. Use `Arc<...>` inside the closure
/// when shared state is actually wanted.
pub struct WorkFn<F> {
    f: F,
}

impl<F> WorkFn<F> {
    /// Creates a new function-backed work payload.
    ///
    /// Prefer [`WorkFn::arc`] when you immediately need a [`WorkRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the payload and returns it as a shared handle.
    pub fn arc<Fut>(f: F) -> WorkRef
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_bag_shared_across_clones() {
        let bag = DataBag::new();
        let other = bag.clone();
        bag.insert("answer", json!(42));
        assert_eq!(other.get("answer"), Some(json!(42)));
        assert_eq!(bag.snapshot(), json!({"answer": 42}));
    }

    #[tokio::test]
    async fn test_work_fn_runs_closure() {
        let work = WorkFn::arc(|ctx: TaskContext| async move {
            ctx.data().insert("ran", json!(true));
            Ok(())
        });
        let bag = DataBag::new();
        let ctx = TaskContext {
            id: Uuid::new_v4(),
            name: Arc::from("t"),
            data: bag.clone(),
            bus: Bus::new(4),
        };
        work.run(ctx).await.unwrap();
        assert_eq!(bag.get("ran"), Some(json!(true)));
    }
}
