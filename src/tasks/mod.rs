//! Task and group definitions: state, gating, callbacks, and builders.

mod actions;
mod base;
mod builder;
mod callbacks;
mod group;
mod options;
mod predicate;
mod state;
mod task;
mod work;

pub use actions::{visible_actions, ActionFn, ActionVisibility, TaskAction};
pub use base::TaskBase;
pub use builder::{GroupBuilder, TaskBuilder};
pub use callbacks::{Callback, CallbackSet, Hook, HookKind, UnitView};
pub use group::TaskGroup;
pub use options::{ProgressBarOptions, ProgressMode};
pub use predicate::{
    PredicateFn, PredicateOutcome, TaskPredicate, PREDICATE_INTERVAL, PREDICATE_MAX_RETRIES,
};
pub use state::{format_duration, State, StateMachine, StateObserver, StateRecord};
pub use task::Task;
pub use work::{DataBag, TaskContext, Work, WorkFn, WorkRef};
