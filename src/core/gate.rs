//! # Dispatch gate.
//!
//! Every unit popped from the ready queue passes through [`Core::gate_admit`]
//! before a worker is spawned. The gate checks, in order:
//!
//! 1. the unit's predicate (park on a tick timer while it holds);
//! 2. the dependency parent (park until it completes, fail if it failed).
//!
//! Parked units are either deferred in the queue (predicate ticks) or
//! recorded under their parent id (dependency waits); neither consumes a
//! worker slot.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::executor::{Core, Msg};
use crate::core::registry::Unit;
use crate::error::TaskError;
use crate::tasks::{PredicateOutcome, State};

/// What to do with a unit popped from the ready queue.
pub(crate) enum GateDecision {
    /// Spawn a worker.
    Proceed,
    /// Parked; the unit re-enters the queue later by itself.
    Parked,
    /// Terminal failure before any worker ran.
    Rejected(TaskError),
}

impl Core {
    pub(crate) fn gate_admit(&mut self, id: Uuid) -> GateDecision {
        match self.gate_predicate(id) {
            GateDecision::Proceed => {}
            other => return other,
        }
        self.gate_parent(id)
    }

    /// Predicate leg of the gate.
    ///
    /// A passing predicate is deleted on the spot so later failure retries
    /// of the same unit skip it.
    fn gate_predicate(&mut self, id: Uuid) -> GateDecision {
        enum Verdict {
            Skip,
            Pass,
            Hold { interval: std::time::Duration, index: u64 },
            Exhausted,
            Panicked,
        }

        let verdict = {
            let Some(unit) = self.registry.get(id) else {
                return GateDecision::Parked;
            };
            let base = unit.base();
            match base.predicate.as_ref() {
                None => Verdict::Skip,
                Some(pred) if pred.is_deleted() => Verdict::Skip,
                Some(pred) => match pred.check() {
                    PredicateOutcome::Pass => Verdict::Pass,
                    PredicateOutcome::Panicked => Verdict::Panicked,
                    PredicateOutcome::Hold if pred.retries_left() == 0 => Verdict::Exhausted,
                    PredicateOutcome::Hold => Verdict::Hold {
                        interval: pred.interval(),
                        index: base.index,
                    },
                },
            }
        };

        match verdict {
            Verdict::Skip => GateDecision::Proceed,
            Verdict::Pass => {
                if let Some(unit) = self.registry.get_mut(id) {
                    if let Some(pred) = unit.base_mut().predicate.as_mut() {
                        pred.delete();
                    }
                }
                GateDecision::Proceed
            }
            Verdict::Hold { interval, index } => {
                self.set_state(id, State::Blocked, Some("Predicate failed".into()));
                self.queue.defer(id, index);
                self.spawn_unit_timer(id, interval, Msg::PredicateTick { id });
                GateDecision::Parked
            }
            Verdict::Exhausted => GateDecision::Rejected(TaskError::PredicateExhausted),
            Verdict::Panicked => GateDecision::Rejected(TaskError::Panic {
                error: "predicate panicked".into(),
            }),
        }
    }

    /// Dependency leg of the gate.
    fn gate_parent(&mut self, id: Uuid) -> GateDecision {
        enum Verdict {
            Clear,
            Wait { parent: Uuid, pname: Arc<str> },
            ParentFailed { pname: String },
        }

        let verdict = {
            let Some(unit) = self.registry.get(id) else {
                return GateDecision::Parked;
            };
            match unit.base().parent {
                None => Verdict::Clear,
                Some(pid) => match self.registry.get(pid) {
                    None => Verdict::ParentFailed { pname: pid.to_string() },
                    Some(parent) => {
                        let pname = Arc::clone(&parent.base().name);
                        match parent.base().state.current() {
                            State::Completed => Verdict::Clear,
                            State::Failed | State::Deleted => {
                                Verdict::ParentFailed { pname: pname.to_string() }
                            }
                            _ => Verdict::Wait { parent: pid, pname },
                        }
                    }
                },
            }
        };

        match verdict {
            Verdict::Clear => GateDecision::Proceed,
            Verdict::Wait { parent, pname } => {
                self.set_state(
                    id,
                    State::Blocked,
                    Some(format!("Waiting for parent: {pname}")),
                );
                self.blocked_on_parent.entry(parent).or_default().push(id);
                GateDecision::Parked
            }
            Verdict::ParentFailed { pname } => {
                GateDecision::Rejected(TaskError::ParentFailed { parent: pname })
            }
        }
    }

    /// One predicate tick for a deferred unit.
    ///
    /// Each tick consumes one retry, re-evaluates the condition, and either
    /// promotes the unit, schedules the next tick, or fails it.
    pub(crate) fn on_predicate_tick(&mut self, id: Uuid) {
        self.timers.remove(&id);
        if !self.queue.is_deferred(id) {
            return; // promoted or removed since the timer fired
        }

        enum Verdict {
            Pass,
            Hold { interval: std::time::Duration },
            Exhausted,
            Panicked,
        }

        let (verdict, left) = {
            let Some(unit) = self.registry.get_mut(id) else { return };
            let base = unit.base_mut();
            let Some(pred) = base.predicate.as_mut() else {
                return;
            };
            if pred.is_deleted() {
                return;
            }
            pred.consume_retry();
            let left = pred.retries_left();
            let verdict = match pred.check() {
                PredicateOutcome::Pass => Verdict::Pass,
                PredicateOutcome::Panicked => Verdict::Panicked,
                PredicateOutcome::Hold if left == 0 => Verdict::Exhausted,
                PredicateOutcome::Hold => Verdict::Hold { interval: pred.interval() },
            };
            (verdict, left)
        };

        // ticks are recorded as retrying before the outcome lands
        self.set_state(id, State::Retrying, Some(format!("Attempts left: {left}")));

        match verdict {
            Verdict::Pass => {
                if let Some(unit) = self.registry.get_mut(id) {
                    if let Some(pred) = unit.base_mut().predicate.as_mut() {
                        pred.delete();
                    }
                }
                if !self.queue.promote(id) {
                    return;
                }
                self.set_state(id, State::Waiting, Some("Predicate satisfied".into()));
                self.start_workers();
            }
            Verdict::Hold { interval } => {
                self.spawn_unit_timer(id, interval, Msg::PredicateTick { id });
            }
            Verdict::Exhausted => {
                self.queue.remove(id);
                self.on_failed(id, TaskError::PredicateExhausted, false);
            }
            Verdict::Panicked => {
                self.queue.remove(id);
                self.on_failed(
                    id,
                    TaskError::Panic { error: "predicate panicked".into() },
                    false,
                );
            }
        }
    }
}
