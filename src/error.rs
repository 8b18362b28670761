//! Error types used by the taskhive scheduler and user work.
//!
//! This module defines two main error enums:
//!
//! - [`ExecError`] — errors raised by the scheduling/coordination layer itself.
//! - [`TaskError`] — errors raised by individual work executions.
//!
//! Both types provide `as_label()` for logging/metrics and for label-based
//! retry matching (see `RetryPolicy::exceptions`).

use thiserror::Error;

use crate::tasks::State;

/// # Errors produced by the scheduler.
///
/// These represent failures of admission, lookup, or lifecycle commands,
/// not failures of the user work itself.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// No unit with the given name is registered.
    #[error("unknown unit: {name}")]
    NotFound {
        /// The name that failed to resolve.
        name: String,
    },

    /// A unit with the same name is already registered.
    #[error("duplicate admission: {name}")]
    DuplicateAdmission {
        /// The conflicting name.
        name: String,
    },

    /// The unit is in a state that forbids removal (running or retrying).
    #[error("cannot remove {name} while {state}")]
    NotRemovable {
        /// Name of the unit.
        name: String,
        /// State that blocked the removal.
        state: State,
    },

    /// A group was submitted with no member tasks.
    #[error("group {name} has no tasks")]
    EmptyGroup {
        /// Name of the rejected group.
        name: String,
    },

    /// The requested action does not exist on the unit, or is hidden
    /// in the unit's current state.
    #[error("action {action} is not available on {task}")]
    ActionUnavailable {
        /// Name of the unit.
        task: String,
        /// Name of the requested action.
        action: String,
    },

    /// Admission was rejected because shutdown is in progress.
    #[error("executor is shutting down")]
    ShuttingDown,

    /// The executor has shut down and no longer accepts commands.
    #[error("executor is closed")]
    Closed,
}

impl ExecError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecError::NotFound { .. } => "exec_not_found",
            ExecError::DuplicateAdmission { .. } => "exec_duplicate_admission",
            ExecError::NotRemovable { .. } => "exec_not_removable",
            ExecError::EmptyGroup { .. } => "exec_empty_group",
            ExecError::ActionUnavailable { .. } => "exec_action_unavailable",
            ExecError::ShuttingDown => "exec_shutting_down",
            ExecError::Closed => "exec_closed",
        }
    }
}

/// # Errors produced by work execution.
///
/// These represent failures of individual task attempts. Retry policies
/// match on [`TaskError::as_label`], so the label of a [`TaskError::Tagged`]
/// error can be used to route retry decisions the same way exception
/// classes would.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked; the panic was caught and isolated.
    #[error("execution panicked: {error}")]
    Panic {
        /// The panic payload rendered as text.
        error: String,
    },

    /// Work failed with a caller-chosen label, matched by retry policies.
    #[error("{label}: {error}")]
    Tagged {
        /// Stable label for retry matching.
        label: String,
        /// The underlying error message.
        error: String,
    },

    /// The unit was failed because a dependency parent did not complete.
    #[error("parent failed: {parent}")]
    ParentFailed {
        /// Name of the failed parent.
        parent: String,
    },

    /// The admission predicate never became true within its retry budget.
    #[error("predicate never satisfied")]
    PredicateExhausted,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail { error: error.into() }
    }

    /// Shorthand for [`TaskError::Tagged`].
    pub fn tagged(label: impl Into<String>, error: impl Into<String>) -> Self {
        TaskError::Tagged {
            label: label.into(),
            error: error.into(),
        }
    }

    /// Returns a short stable label for logs and retry matching.
    ///
    /// For [`TaskError::Tagged`] this is the caller-chosen label; the other
    /// variants map to fixed snake_case labels.
    pub fn as_label(&self) -> &str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panic { .. } => "task_panic",
            TaskError::Tagged { label, .. } => label,
            TaskError::ParentFailed { .. } => "task_parent_failed",
            TaskError::PredicateExhausted => "task_predicate_exhausted",
        }
    }
}
