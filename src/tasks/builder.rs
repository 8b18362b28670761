//! # Fluent construction of tasks and groups.
//!
//! [`TaskBuilder`] and [`GroupBuilder`] are the public way to assemble
//! units before admission. Everything is optional except the work payload
//! (for tasks) and at least one member (for groups, enforced at admission).
//!
//! ## Example
//! ```rust
//! use taskhive::{RetryPolicy, Task, TaskGroup, WorkFn};
//!
//! let fetch = Task::builder(WorkFn::arc(|_ctx| async { Ok(()) }))
//!     .label("fetch")
//!     .retry(RetryPolicy::fixed(3, 1))
//!     .build();
//!
//! let convert = Task::builder(WorkFn::arc(|_ctx| async { Ok(()) }))
//!     .label("convert")
//!     .wait_for("fetch")
//!     .build();
//!
//! let group = TaskGroup::builder()
//!     .label("ingest")
//!     .task(fetch)
//!     .task(convert)
//!     .build();
//! assert_eq!(group.len(), 2);
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::TaskError;
use crate::policies::RetryPolicy;
use crate::tasks::actions::{ActionVisibility, TaskAction};
use crate::tasks::base::TaskBase;
use crate::tasks::callbacks::{Hook, HookKind, UnitView};
use crate::tasks::group::TaskGroup;
use crate::tasks::options::{ProgressBarOptions, ProgressMode};
use crate::tasks::predicate::TaskPredicate;
use crate::tasks::task::Task;
use crate::tasks::work::{TaskContext, WorkFn, WorkRef};

/// Builder for a single [`Task`].
pub struct TaskBuilder {
    work: WorkRef,
    base: TaskBase,
    progress: ProgressBarOptions,
}

impl TaskBuilder {
    pub fn new(work: WorkRef) -> Self {
        Self {
            work,
            base: TaskBase::new(),
            progress: ProgressBarOptions::default(),
        }
    }

    /// Builder over a closure payload; shorthand for `new(WorkFn::arc(f))`.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(WorkFn::arc(f))
    }

    /// Unique name for the task. Unlabeled tasks are named `Task-{n}`
    /// at admission.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.base.label = Some(label.into());
        self
    }

    /// Free-form description.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.base.comment = Some(comment.into());
        self
    }

    /// Seeds the shared data bag.
    pub fn data(self, key: impl Into<String>, value: Value) -> Self {
        self.base.data.insert(key, value);
        self
    }

    /// Gates dispatch on the named unit completing first.
    ///
    /// The name is resolved at admission; the parent must already be
    /// registered.
    pub fn wait_for(mut self, parent: impl Into<String>) -> Self {
        self.base.wait_for = Some(parent.into());
        self
    }

    /// Gates dispatch on `condition`, re-checked every `interval` up to
    /// `max_retries` times.
    pub fn predicate(
        mut self,
        condition: impl Fn() -> bool + Send + Sync + 'static,
        max_retries: u32,
        interval: Duration,
    ) -> Self {
        self.base.predicate = Some(TaskPredicate::new(condition, max_retries, interval));
        self
    }

    /// [`TaskBuilder::predicate`] with the default budget and interval.
    pub fn predicate_fn(mut self, condition: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.base.predicate = Some(TaskPredicate::with_defaults(condition));
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.base.retry = policy;
        self
    }

    /// Fires when a worker picks the task up. Default: once.
    pub fn on_start(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnStart, cb, HookKind::OnStart.default_fire_once())
    }

    /// Fires on successful completion. Default: once.
    pub fn on_completed(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnCompleted, cb, HookKind::OnCompleted.default_fire_once())
    }

    /// Fires on every terminal failure.
    pub fn on_failed(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnFailed, cb, HookKind::OnFailed.default_fire_once())
    }

    /// Fires on every terminal outcome, success or failure.
    pub fn on_finish(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnFinish, cb, HookKind::OnFinish.default_fire_once())
    }

    /// Installs a hook with an explicit firing cadence.
    pub fn hook(
        mut self,
        kind: HookKind,
        cb: impl Fn(&UnitView) + Send + Sync + 'static,
        fire_once: bool,
    ) -> Self {
        self.base.callbacks.set(kind, Hook::new(Arc::new(cb), fire_once));
        self
    }

    /// Attaches a named on-demand action.
    pub fn action(
        mut self,
        name: impl Into<String>,
        visibility: ActionVisibility,
        handler: impl Fn(&UnitView) + Send + Sync + 'static,
    ) -> Self {
        self.base.actions.push(TaskAction::new(name, visibility, handler));
        self
    }

    /// Determinate progress range.
    pub fn progress(mut self, minimum: u32, maximum: u32) -> Self {
        self.progress.minimum = minimum;
        self.progress.maximum = maximum;
        self.progress.mode = ProgressMode::Determinate;
        self
    }

    /// Activity-only progress display.
    pub fn indeterminate(mut self) -> Self {
        self.progress.mode = ProgressMode::Indeterminate;
        self
    }

    /// Text shown while the task runs.
    pub fn working_text(mut self, text: impl Into<String>) -> Self {
        self.progress.working_text = text.into();
        self
    }

    pub fn build(self) -> Task {
        Task {
            base: self.base,
            work: self.work,
            group: None,
            progress: self.progress,
        }
    }
}

/// Builder for a [`TaskGroup`].
pub struct GroupBuilder {
    base: TaskBase,
    staged: Vec<Task>,
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self {
            base: TaskBase::new(),
            staged: Vec::new(),
        }
    }

    /// Unique name for the group. Unlabeled groups are named `Group-{n}`
    /// at admission.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.base.label = Some(label.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.base.comment = Some(comment.into());
        self
    }

    pub fn data(self, key: impl Into<String>, value: Value) -> Self {
        self.base.data.insert(key, value);
        self
    }

    /// Gates the group on the named unit completing first.
    pub fn wait_for(mut self, parent: impl Into<String>) -> Self {
        self.base.wait_for = Some(parent.into());
        self
    }

    /// Retry policy applied to the group's aggregate outcome.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.base.retry = policy;
        self
    }

    pub fn on_start(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnStart, cb, HookKind::OnStart.default_fire_once())
    }

    pub fn on_completed(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnCompleted, cb, HookKind::OnCompleted.default_fire_once())
    }

    pub fn on_failed(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnFailed, cb, HookKind::OnFailed.default_fire_once())
    }

    pub fn on_finish(self, cb: impl Fn(&UnitView) + Send + Sync + 'static) -> Self {
        self.hook(HookKind::OnFinish, cb, HookKind::OnFinish.default_fire_once())
    }

    pub fn hook(
        mut self,
        kind: HookKind,
        cb: impl Fn(&UnitView) + Send + Sync + 'static,
        fire_once: bool,
    ) -> Self {
        self.base.callbacks.set(kind, Hook::new(Arc::new(cb), fire_once));
        self
    }

    /// Adds a member task.
    pub fn task(mut self, task: Task) -> Self {
        self.staged.push(task);
        self
    }

    /// Adds a batch of member tasks.
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.staged.extend(tasks);
        self
    }

    /// Convenience: adds a labeled closure-backed member.
    pub fn add_event<F, Fut>(self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let task = TaskBuilder::from_fn(f).label(label).build();
        self.task(task)
    }

    pub fn build(self) -> TaskGroup {
        TaskGroup {
            base: self.base,
            members: Vec::new(),
            staged: self.staged,
        }
    }
}

impl Default for GroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
