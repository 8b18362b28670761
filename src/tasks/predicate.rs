//! # Admission predicates.
//!
//! A [`TaskPredicate`] parks a unit at dispatch time until an external
//! condition holds. The coordinator evaluates the condition when the unit
//! is first dispatched and then once per tick interval, consuming one
//! retry per tick, until the condition passes or the budget runs out.
//!
//! Once the condition passes, the predicate is deleted and never
//! evaluated again, including across failure retries of the same unit.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

/// Condition closure. Must be cheap; it runs on the coordinator.
pub type PredicateFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Default number of tick evaluations before giving up.
pub const PREDICATE_MAX_RETRIES: u32 = 60;

/// Default interval between tick evaluations.
pub const PREDICATE_INTERVAL: Duration = Duration::from_secs(1);

/// Result of evaluating a predicate condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOutcome {
    /// Condition returned `true`.
    Pass,
    /// Condition returned `false`.
    Hold,
    /// Condition panicked; the unit must fail.
    Panicked,
}

/// Gate condition with a tick budget.
pub struct TaskPredicate {
    condition: PredicateFn,
    max_retries: u32,
    interval: Duration,
    retries_left: u32,
    deleted: bool,
}

impl TaskPredicate {
    /// Creates a predicate with an explicit budget and tick interval.
    pub fn new(
        condition: impl Fn() -> bool + Send + Sync + 'static,
        max_retries: u32,
        interval: Duration,
    ) -> Self {
        Self {
            condition: Arc::new(condition),
            max_retries,
            interval,
            retries_left: max_retries,
            deleted: false,
        }
    }

    /// Creates a predicate with the default budget and interval.
    pub fn with_defaults(condition: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::new(condition, PREDICATE_MAX_RETRIES, PREDICATE_INTERVAL)
    }

    /// Evaluates the condition, isolating panics.
    pub fn check(&self) -> PredicateOutcome {
        let condition = Arc::clone(&self.condition);
        match catch_unwind(AssertUnwindSafe(move || condition())) {
            Ok(true) => PredicateOutcome::Pass,
            Ok(false) => PredicateOutcome::Hold,
            Err(_) => PredicateOutcome::Panicked,
        }
    }

    /// Consumes one tick from the budget.
    pub fn consume_retry(&mut self) {
        self.retries_left = self.retries_left.saturating_sub(1);
    }

    /// Ticks remaining before the predicate is exhausted.
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Interval between tick evaluations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Restores the full tick budget (manual "Reset & Retry").
    pub fn reset(&mut self) {
        self.retries_left = self.max_retries;
        self.deleted = false;
    }

    /// Marks the predicate as satisfied; idempotent.
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    /// True once the predicate passed (or was cleared by removal).
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Snapshot for debug surfaces.
    pub fn inspect(&self) -> Value {
        json!({
            "max_retries": self.max_retries,
            "retries_left": self.retries_left,
            "interval_ms": self.interval.as_millis() as u64,
            "deleted": self.deleted,
        })
    }
}

impl fmt::Debug for TaskPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPredicate")
            .field("retries_left", &self.retries_left)
            .field("interval", &self.interval)
            .field("deleted", &self.deleted)
            .finish()
    }
}
