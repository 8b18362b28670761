//! # Scheduler events published on the bus.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Admission events**: units entering and leaving the system (added, removed)
//! - **Lifecycle events**: worker execution flow (started, completed, failed, finished)
//! - **System events**: aggregate status counters, idle notification, progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps, unit name,
//! failure reasons, attempt numbers, and status counters.
//!
//! ## Ordering guarantees
//! Each published event carries a sequence number (`seq`) stamped by the [`Bus`]
//! at publish time, increasing monotonically. Use `seq` to restore the exact
//! order when events are observed out of order.
//!
//! [`Bus`]: crate::events::Bus

use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission events ===
    /// A task or group was registered with the executor.
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `at`, `seq`
    TaskAdded,

    /// A task or group was removed (explicitly or as part of a cascade).
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `reason`: removal comment, when present
    /// - `at`, `seq`
    TaskRemoved,

    // === Lifecycle events ===
    /// A worker started executing the unit.
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `attempt`: attempt number (1-based)
    /// - `at`, `seq`
    RunnerStarted,

    /// The unit's work finished successfully.
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `at`, `seq`
    RunnerCompleted,

    /// The unit's work failed terminally (no retry scheduled).
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `reason`: failure message
    /// - `attempt`: last attempt number
    /// - `at`, `seq`
    RunnerFailed,

    /// The unit reached a terminal state, after the terminal callbacks ran.
    ///
    /// Emitted exactly once per terminal outcome, for both completions and
    /// failures.
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `at`, `seq`
    TaskFinished,

    // === System events ===
    /// Aggregate per-state counters changed.
    ///
    /// Sets:
    /// - `counts`: snapshot of per-state counters
    /// - `at`, `seq`
    StatusUpdated,

    /// The scheduler became quiescent and stayed so for the debounce window.
    ///
    /// Emitted at most once per quiescent period.
    ///
    /// Sets:
    /// - `at`, `seq`
    SystemIdle,

    /// User work reported a progress value.
    ///
    /// Sets:
    /// - `task`: unit name
    /// - `value`: reported progress value
    /// - `at`, `seq`
    ProgressUpdated,
}

/// Snapshot of per-state unit counters.
///
/// Each counter reflects units currently in that state. `deleted` keeps
/// growing in practice, since removed units never leave the arena alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub initialized: u64,
    pub waiting: u64,
    pub blocked: u64,
    pub running: u64,
    pub retrying: u64,
    pub completed: u64,
    pub failed: u64,
    pub deleted: u64,
}

impl Counts {
    /// Number of units in a non-terminal, in-system state.
    #[inline]
    pub fn active(&self) -> u64 {
        self.waiting + self.blocked + self.running + self.retrying
    }
}

/// Scheduler event with optional metadata.
///
/// - `seq`: monotonic sequence, stamped by the bus at publish time
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone)]
pub struct Event {
    /// Monotonically increasing sequence number (0 until published).
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Event classification.
    pub kind: EventKind,
    /// Name of the unit, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (failure messages, removal comments).
    pub reason: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Progress value reported by user work.
    pub value: Option<u32>,
    /// Status counters (set for [`EventKind::StatusUpdated`]).
    pub counts: Option<Counts>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    ///
    /// The sequence number is assigned when the event is published.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            attempt: None,
            value: None,
            counts: None,
        }
    }

    /// Attaches a unit name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a progress value.
    #[inline]
    pub fn with_value(mut self, value: u32) -> Self {
        self.value = Some(value);
        self
    }

    /// Attaches a counter snapshot.
    #[inline]
    pub fn with_counts(mut self, counts: Counts) -> Self {
        self.counts = Some(counts);
        self
    }

    /// True for terminal lifecycle kinds ([`RunnerCompleted`], [`RunnerFailed`]).
    ///
    /// [`RunnerCompleted`]: EventKind::RunnerCompleted
    /// [`RunnerFailed`]: EventKind::RunnerFailed
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::RunnerCompleted | EventKind::RunnerFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_set_fields() {
        let ev = Event::new(EventKind::RunnerFailed)
            .with_task("demo")
            .with_reason("boom")
            .with_attempt(3);

        assert_eq!(ev.kind, EventKind::RunnerFailed);
        assert_eq!(ev.task.as_deref(), Some("demo"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        assert_eq!(ev.attempt, Some(3));
        assert!(ev.is_terminal());
    }

    #[test]
    fn test_counts_active_excludes_terminal() {
        let counts = Counts {
            waiting: 2,
            running: 1,
            completed: 10,
            failed: 4,
            ..Counts::default()
        };
        assert_eq!(counts.active(), 3);
    }
}
