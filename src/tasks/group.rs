//! # Task groups.
//!
//! A [`TaskGroup`] is a schedulable unit that owns a set of member tasks.
//! Members stay *staged* inside the group until the group itself is
//! dispatched; at that point the executor admits them as ordinary tasks
//! and the group's worker waits for all member outcomes before settling
//! the group's own terminal state.
//!
//! The group completes when every member completes, and fails with an
//! aggregate error when any member fails. The group's own retry policy
//! applies to that aggregate outcome.

use serde_json::Value;
use uuid::Uuid;

use crate::tasks::base::TaskBase;
use crate::tasks::builder::GroupBuilder;
use crate::tasks::task::Task;

/// A schedulable collection of member tasks.
pub struct TaskGroup {
    pub(crate) base: TaskBase,
    /// Admitted member ids, filled when the group is dispatched.
    pub(crate) members: Vec<Uuid>,
    /// Member tasks held until the group starts.
    pub(crate) staged: Vec<Task>,
}

impl TaskGroup {
    pub fn builder() -> GroupBuilder {
        GroupBuilder::new()
    }

    pub fn base(&self) -> &TaskBase {
        &self.base
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Number of members, staged or admitted.
    pub fn len(&self) -> usize {
        self.members.len() + self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.staged.is_empty()
    }

    /// Debug snapshot of the group.
    pub fn inspect(&self) -> Value {
        let mut out = self.base.inspect();
        out["kind"] = "group".into();
        out["members"] = self
            .members
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .into();
        out["staged"] = (self.staged.len() as u64).into();
        out
    }
}
