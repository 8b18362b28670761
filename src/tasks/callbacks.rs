//! # Lifecycle callbacks.
//!
//! A [`CallbackSet`] holds up to four hooks tied to a unit's lifecycle:
//!
//! | Hook           | Fires on                         | Default cadence |
//! |----------------|----------------------------------|-----------------|
//! | `on_start`     | dispatch (worker picked up unit) | once            |
//! | `on_completed` | successful terminal outcome      | once            |
//! | `on_failed`    | every terminal failure attempt   | every attempt   |
//! | `on_finish`    | any terminal outcome             | every attempt   |
//!
//! Fire-once hooks are dropped after their first invocation. Hooks run
//! synchronously on the coordinator; panics are caught and logged, never
//! propagated into scheduler state.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::tasks::state::State;
use crate::tasks::work::DataBag;

/// Read-only snapshot of a unit handed to callbacks and actions.
#[derive(Clone)]
pub struct UnitView {
    /// Unit name.
    pub name: Arc<str>,
    /// State at the moment the hook fires.
    pub state: State,
    /// Last failure message, when present.
    pub error: Option<String>,
    /// Retry attempts consumed so far.
    pub attempt: u32,
    /// The unit's shared data bag.
    pub data: DataBag,
}

/// Callback closure. Runs synchronously on the coordinator; keep it cheap.
pub type Callback = Arc<dyn Fn(&UnitView) + Send + Sync>;

/// A callback plus its firing cadence.
pub struct Hook {
    callback: Callback,
    fire_once: bool,
}

impl Hook {
    pub fn new(callback: Callback, fire_once: bool) -> Self {
        Self { callback, fire_once }
    }
}

/// Which lifecycle hook a callback is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    OnStart,
    OnCompleted,
    OnFailed,
    OnFinish,
}

impl HookKind {
    /// Default cadence: start/completed hooks fire once, the rest every attempt.
    pub fn default_fire_once(&self) -> bool {
        matches!(self, HookKind::OnStart | HookKind::OnCompleted)
    }
}

/// The four lifecycle hooks of a unit.
#[derive(Default)]
pub struct CallbackSet {
    on_start: Option<Hook>,
    on_completed: Option<Hook>,
    on_failed: Option<Hook>,
    on_finish: Option<Hook>,
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a hook, replacing any previous one of the same kind.
    pub fn set(&mut self, kind: HookKind, hook: Hook) {
        *self.slot(kind) = Some(hook);
    }

    /// Fires the hook of the given kind, if installed.
    ///
    /// Fire-once hooks are removed after the call. A panicking callback is
    /// caught and logged.
    pub fn fire(&mut self, kind: HookKind, view: &UnitView) {
        let slot = self.slot(kind);
        let Some(hook) = slot.take() else { return };

        let callback = Arc::clone(&hook.callback);
        if catch_unwind(AssertUnwindSafe(|| callback(view))).is_err() {
            tracing::error!(task = %view.name, hook = ?kind, "callback panicked");
        }
        if !hook.fire_once {
            *self.slot(kind) = Some(hook);
        }
    }

    /// Drops all hooks (removal path).
    pub fn delete(&mut self) {
        self.on_start = None;
        self.on_completed = None;
        self.on_failed = None;
        self.on_finish = None;
    }

    pub fn is_empty(&self) -> bool {
        self.on_start.is_none()
            && self.on_completed.is_none()
            && self.on_failed.is_none()
            && self.on_finish.is_none()
    }

    fn slot(&mut self, kind: HookKind) -> &mut Option<Hook> {
        match kind {
            HookKind::OnStart => &mut self.on_start,
            HookKind::OnCompleted => &mut self.on_completed,
            HookKind::OnFailed => &mut self.on_failed,
            HookKind::OnFinish => &mut self.on_finish,
        }
    }
}

impl fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSet")
            .field("on_start", &self.on_start.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}
