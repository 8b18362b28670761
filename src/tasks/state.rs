//! # Unit state machine.
//!
//! Every task and group carries a [`StateMachine`]: the current [`State`]
//! plus an append-only history of [`StateRecord`]s. History is never
//! rewritten; manual "Reset & Retry" appends a fresh `Initialized` record
//! instead of clearing anything.
//!
//! ## States
//! ```text
//! Initialized ─► Waiting ─► Running ─► Completed
//!                  │  ▲        │
//!                  │  │        ├──► Retrying ──► Waiting (after delay)
//!                  ▼  │        ▼
//!                Blocked     Failed
//!
//! Deleted: reachable from any removable state via remove/shutdown.
//! ```
//!
//! ## No-op transitions
//! Setting the state it already has records nothing and does not notify
//! the observer, so periodic re-evaluations (predicate ticks) leave a
//! single history record rather than one per tick.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};

/// Lifecycle state of a task or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Constructed, not yet queued.
    Initialized,
    /// In the ready queue, eligible for dispatch.
    Waiting,
    /// Parked on a dependency parent or an unsatisfied predicate.
    Blocked,
    /// A worker is executing the unit.
    Running,
    /// Failed, waiting out a retry delay (or between predicate ticks).
    Retrying,
    /// Finished successfully. Terminal.
    Completed,
    /// Failed with no retry scheduled. Terminal.
    Failed,
    /// Removed from the system. Terminal.
    Deleted,
}

impl State {
    /// All states, in counter order.
    pub const ALL: [State; 8] = [
        State::Initialized,
        State::Waiting,
        State::Blocked,
        State::Running,
        State::Retrying,
        State::Completed,
        State::Failed,
        State::Deleted,
    ];

    /// Stable snake_case label.
    pub fn as_label(&self) -> &'static str {
        match self {
            State::Initialized => "initialized",
            State::Waiting => "waiting",
            State::Blocked => "blocked",
            State::Running => "running",
            State::Retrying => "retrying",
            State::Completed => "completed",
            State::Failed => "failed",
            State::Deleted => "deleted",
        }
    }

    /// In the system and not yet terminal.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, State::Waiting | State::Blocked | State::Running | State::Retrying)
    }

    /// Completed, failed, or deleted.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Failed | State::Deleted)
    }

    /// Removal is refused while a unit is in flight.
    #[inline]
    pub fn is_removable(&self) -> bool {
        !matches!(self, State::Running | State::Retrying)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            State::Initialized => 0,
            State::Waiting => 1,
            State::Blocked => 2,
            State::Running => 3,
            State::Retrying => 4,
            State::Completed => 5,
            State::Failed => 6,
            State::Deleted => 7,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One entry in a unit's state history.
#[derive(Debug, Clone)]
pub struct StateRecord {
    /// The state entered.
    pub state: State,
    /// Optional context for the transition ("Queued", "Attempts left: 2", ...).
    pub comment: Option<String>,
    /// Wall-clock time of the transition.
    pub at: SystemTime,
}

/// Observer invoked on every recorded transition.
///
/// The first argument is the previous state, `None` when the observer is
/// seeded with the machine's current state at attach time.
pub type StateObserver = Arc<dyn Fn(Option<State>, State) + Send + Sync>;

/// Current state plus append-only transition history.
pub struct StateMachine {
    history: Vec<StateRecord>,
    observer: Option<StateObserver>,
}

impl StateMachine {
    /// Creates a machine in [`State::Initialized`] with one history record.
    pub fn new() -> Self {
        Self {
            history: vec![StateRecord {
                state: State::Initialized,
                comment: Some("Created".into()),
                at: SystemTime::now(),
            }],
            observer: None,
        }
    }

    /// Current state (the last recorded entry).
    pub fn current(&self) -> State {
        // history always holds at least the initial record
        self.history.last().map(|r| r.state).unwrap_or(State::Initialized)
    }

    /// Records a transition to `next`.
    ///
    /// Returns `false` without recording when `next` equals the current
    /// state; the observer is not notified in that case either.
    pub fn set(&mut self, next: State, comment: Option<String>) -> bool {
        let current = self.current();
        if current == next {
            return false;
        }
        self.history.push(StateRecord {
            state: next,
            comment,
            at: SystemTime::now(),
        });
        if let Some(observer) = &self.observer {
            observer(Some(current), next);
        }
        true
    }

    /// Installs the transition observer and seeds it with the current state.
    pub fn attach_observer(&mut self, observer: StateObserver) {
        observer(None, self.current());
        self.observer = Some(observer);
    }

    /// Full transition history, oldest first.
    pub fn history(&self) -> &[StateRecord] {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.current().is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.current().is_terminal()
    }

    pub fn is_removable(&self) -> bool {
        self.current().is_removable()
    }

    /// History snapshot with human-readable dwell times between records.
    pub fn inspect(&self) -> Value {
        let records: Vec<Value> = self
            .history
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let took = if i > 0 {
                    rec.at
                        .duration_since(self.history[i - 1].at)
                        .map(|d| format_duration(d))
                        .unwrap_or_else(|_| "0ms".into())
                } else {
                    "0ms".into()
                };
                json!({
                    "state": rec.state.as_label(),
                    "comment": rec.comment,
                    "at_ms": rec.at.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0),
                    "took": took,
                })
            })
            .collect();
        json!({
            "current": self.current().as_label(),
            "history": records,
        })
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current())
            .field("records", &self.history.len())
            .finish()
    }
}

/// Formats a duration for history snapshots: `450ms`, `2.5s`, `3m 05s`, `1h 12m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
