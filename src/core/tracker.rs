//! # Status tracking and idle detection.
//!
//! [`StateCounters`] is the shared sink behind every unit's state machine
//! observer: each recorded transition decrements the old state's counter
//! and increments the new one's. The counters are atomics, so observers
//! stay synchronous and lock-free.
//!
//! [`StatusTracker`] wraps the counters with publish bookkeeping
//! (`StatusUpdated` deltas) and the idle debounce machinery. The idle
//! flag starts **notified** so a freshly created executor does not
//! announce an idle system nobody asked about.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::events::Counts;
use crate::tasks::{State, StateObserver};

/// Per-state counters shared between the coordinator and unit observers.
#[derive(Debug, Default)]
pub(crate) struct StateCounters {
    counters: [AtomicU64; 8],
}

impl StateCounters {
    /// Applies one observed transition.
    pub fn on_transition(&self, old: Option<State>, new: State) {
        if let Some(old) = old {
            self.counters[old.index()].fetch_sub(1, Ordering::Relaxed);
        }
        self.counters[new.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Counts {
        let load = |s: State| self.counters[s.index()].load(Ordering::Relaxed);
        Counts {
            initialized: load(State::Initialized),
            waiting: load(State::Waiting),
            blocked: load(State::Blocked),
            running: load(State::Running),
            retrying: load(State::Retrying),
            completed: load(State::Completed),
            failed: load(State::Failed),
            deleted: load(State::Deleted),
        }
    }
}

/// Aggregate status and idle-notification state.
pub(crate) struct StatusTracker {
    counters: Arc<StateCounters>,
    last_published: Option<Counts>,
    idle_notified: bool,
    pending_idle: Option<CancellationToken>,
    debounce: Duration,
}

impl StatusTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            counters: Arc::new(StateCounters::default()),
            last_published: Some(Counts::default()),
            // suppress the idle notification of a freshly created executor
            idle_notified: true,
            pending_idle: None,
            debounce,
        }
    }

    /// Observer closure to attach to a unit's state machine.
    pub fn observer(&self) -> StateObserver {
        let counters = Arc::clone(&self.counters);
        Arc::new(move |old, new| counters.on_transition(old, new))
    }

    pub fn snapshot(&self) -> Counts {
        self.counters.snapshot()
    }

    /// Returns the current counts if they differ from the last published
    /// snapshot, marking them published.
    pub fn take_changed(&mut self) -> Option<Counts> {
        let counts = self.counters.snapshot();
        if self.last_published == Some(counts) {
            None
        } else {
            self.last_published = Some(counts);
            Some(counts)
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn idle_notified(&self) -> bool {
        self.idle_notified
    }

    pub fn set_idle_notified(&mut self, notified: bool) {
        self.idle_notified = notified;
    }

    pub fn has_pending_idle(&self) -> bool {
        self.pending_idle.is_some()
    }

    /// Arms the debounce timer, returning its cancellation token.
    pub fn arm_idle(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        self.pending_idle = Some(token.clone());
        token
    }

    /// Cancels any pending debounce timer (activity resumed).
    pub fn cancel_pending_idle(&mut self) {
        if let Some(token) = self.pending_idle.take() {
            token.cancel();
        }
    }

    /// Drops the pending marker once the timer has fired.
    pub fn clear_pending_idle(&mut self) {
        self.pending_idle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_follow_transitions() {
        let counters = StateCounters::default();
        counters.on_transition(None, State::Initialized);
        counters.on_transition(Some(State::Initialized), State::Waiting);
        counters.on_transition(Some(State::Waiting), State::Running);
        counters.on_transition(Some(State::Running), State::Completed);

        let counts = counters.snapshot();
        assert_eq!(counts.initialized, 0);
        assert_eq!(counts.running, 0);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.active(), 0);
    }

    #[test]
    fn test_take_changed_deduplicates() {
        let mut tracker = StatusTracker::new(Duration::from_millis(100));
        assert!(tracker.take_changed().is_none());

        tracker.observer()(None, State::Waiting);
        assert!(tracker.take_changed().is_some());
    }

    #[test]
    fn test_idle_starts_notified() {
        let tracker = StatusTracker::new(Duration::from_millis(100));
        assert!(tracker.idle_notified());
        assert!(!tracker.has_pending_idle());
    }
}
