//! # User-defined actions.
//!
//! A [`TaskAction`] is a named command attached to a unit, invoked on
//! demand through `Executor::run_action`. Visibility rules let surfaces
//! (context menus, dashboards) offer an action only in the states where
//! it makes sense.

use std::fmt;
use std::sync::Arc;

use crate::tasks::callbacks::UnitView;
use crate::tasks::state::State;

/// Action handler closure. Runs synchronously on the coordinator.
pub type ActionFn = Arc<dyn Fn(&UnitView) + Send + Sync>;

/// When an action is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionVisibility {
    /// Offered in every state.
    Always,
    /// Offered only once the unit completed.
    OnCompleted,
    /// Offered only once the unit failed.
    OnFailed,
}

impl ActionVisibility {
    /// Whether the action is offered for a unit in `state`.
    pub fn allows(&self, state: State) -> bool {
        match self {
            ActionVisibility::Always => true,
            ActionVisibility::OnCompleted => state == State::Completed,
            ActionVisibility::OnFailed => state == State::Failed,
        }
    }
}

/// Named command attached to a unit.
pub struct TaskAction {
    name: String,
    handler: ActionFn,
    visibility: ActionVisibility,
}

impl TaskAction {
    pub fn new(
        name: impl Into<String>,
        visibility: ActionVisibility,
        handler: impl Fn(&UnitView) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            visibility,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> ActionVisibility {
        self.visibility
    }

    pub fn handler(&self) -> ActionFn {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskAction")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// Filters `actions` down to those offered in `state`.
pub fn visible_actions(actions: &[TaskAction], state: State) -> Vec<&TaskAction> {
    actions.iter().filter(|a| a.visibility().allows(state)).collect()
}
