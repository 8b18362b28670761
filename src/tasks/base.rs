//! # Shared unit core (`TaskBase`).
//!
//! [`TaskBase`] carries everything a task and a group have in common:
//! identity, state machine, retry policy, predicate, callbacks, actions,
//! the shared data bag, and dependency links.
//!
//! Dependency links are ids into the executor's registry arena, never
//! references to other units, so unit graphs cannot form ownership cycles.
//! The `wait_for` name is resolved to a parent id at admission.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::policies::RetryPolicy;
use crate::tasks::actions::TaskAction;
use crate::tasks::callbacks::{CallbackSet, UnitView};
use crate::tasks::predicate::TaskPredicate;
use crate::tasks::state::StateMachine;
use crate::tasks::work::DataBag;

/// Common core of tasks and groups.
pub struct TaskBase {
    /// Process-unique id, assigned at construction.
    pub(crate) uid: Uuid,
    /// Global admission order; 0 until admitted. Drives FIFO dispatch.
    pub(crate) index: u64,
    /// Unique name; empty until admission when no label was given.
    pub(crate) name: Arc<str>,
    /// Caller-chosen label, if any.
    pub(crate) label: Option<String>,
    /// Free-form description.
    pub(crate) comment: Option<String>,
    /// Shared key/value store visible to work, callbacks, and actions.
    pub(crate) data: DataBag,
    pub(crate) retry: RetryPolicy,
    pub(crate) predicate: Option<TaskPredicate>,
    pub(crate) callbacks: CallbackSet,
    pub(crate) actions: Vec<TaskAction>,
    /// Last terminal failure message.
    pub(crate) error: Option<String>,
    pub(crate) state: StateMachine,
    /// Unresolved `wait_for` target; cleared at admission.
    pub(crate) wait_for: Option<String>,
    /// Dependency parent, resolved at admission.
    pub(crate) parent: Option<Uuid>,
    /// Units that wait for this one.
    pub(crate) children: Vec<Uuid>,
}

impl TaskBase {
    pub(crate) fn new() -> Self {
        Self {
            uid: Uuid::new_v4(),
            index: 0,
            name: Arc::from(""),
            label: None,
            comment: None,
            data: DataBag::new(),
            retry: RetryPolicy::default(),
            predicate: None,
            callbacks: CallbackSet::new(),
            actions: Vec::new(),
            error: None,
            state: StateMachine::new(),
            wait_for: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn data(&self) -> &DataBag {
        &self.data
    }

    pub fn state(&self) -> &StateMachine {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn actions(&self) -> &[TaskAction] {
        &self.actions
    }

    /// Read-only snapshot for callbacks and actions.
    pub(crate) fn view(&self) -> UnitView {
        UnitView {
            name: Arc::clone(&self.name),
            state: self.state.current(),
            error: self.error.clone(),
            attempt: self.retry.attempt(),
            data: self.data.clone(),
        }
    }

    /// Common part of the unit debug snapshot.
    pub(crate) fn inspect(&self) -> Value {
        json!({
            "uid": self.uid.to_string(),
            "name": self.name.as_ref(),
            "comment": self.comment,
            "error": self.error,
            "state": self.state.inspect(),
            "retry": self.retry.inspect(),
            "predicate": self.predicate.as_ref().map(|p| p.inspect()),
            "data": self.data.snapshot(),
            "parent": self.parent.map(|p| p.to_string()),
            "children": self.children.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        })
    }
}
