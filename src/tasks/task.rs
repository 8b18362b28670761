//! A single unit of async work.

use serde_json::Value;
use uuid::Uuid;

use crate::tasks::base::TaskBase;
use crate::tasks::builder::TaskBuilder;
use crate::tasks::options::ProgressBarOptions;
use crate::tasks::work::WorkRef;

/// A schedulable unit wrapping one [`Work`](crate::Work) payload.
///
/// Built through [`Task::builder`]; submitted via `Executor::add_task`
/// or as a member of a [`TaskGroup`](crate::TaskGroup).
pub struct Task {
    pub(crate) base: TaskBase,
    pub(crate) work: WorkRef,
    /// Owning group, linked when the group admits its members.
    pub(crate) group: Option<Uuid>,
    pub(crate) progress: ProgressBarOptions,
}

impl Task {
    pub fn builder(work: WorkRef) -> TaskBuilder {
        TaskBuilder::new(work)
    }

    pub fn base(&self) -> &TaskBase {
        &self.base
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn progress_options(&self) -> &ProgressBarOptions {
        &self.progress
    }

    /// Debug snapshot of the task.
    pub fn inspect(&self) -> Value {
        let mut out = self.base.inspect();
        out["kind"] = "task".into();
        out["group"] = self.group.map(|g| g.to_string()).into();
        out["progress"] = self.progress.inspect();
        out
    }
}
