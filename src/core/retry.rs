//! # Automatic retry scheduling.
//!
//! When a worker reports a failure, the coordinator consults the unit's
//! retry policy. A `Retry` decision defers the unit for the policy's
//! delay and re-queues it when the timer fires; any other decision falls
//! through to the terminal failure path.

use std::time::Duration;

use uuid::Uuid;

use crate::core::executor::{Core, Msg};
use crate::error::TaskError;
use crate::policies::RetryDecision;
use crate::tasks::State;

impl Core {
    /// Schedules a retry if the policy allows one.
    ///
    /// Returns `true` when another attempt was scheduled; the caller must
    /// then skip the terminal failure path.
    pub(crate) fn handle_failure(&mut self, id: Uuid, err: &TaskError) -> bool {
        let (delay, left, index) = {
            let Some(unit) = self.registry.get_mut(id) else { return false };
            let base = unit.base_mut();
            match base.retry.should_retry(err) {
                RetryDecision::Retry => {}
                RetryDecision::Success => {
                    tracing::debug!(task = %base.name, error = %err, "failure accepted, no retry policy");
                    return false;
                }
                RetryDecision::Fail => {
                    tracing::debug!(task = %base.name, error = %err, "retry budget exhausted");
                    return false;
                }
            }
            let delay = base.retry.get_delay();
            base.retry.advance();
            (delay, base.retry.attempts_left(), base.index)
        };

        self.set_state(id, State::Retrying, Some(format!("Attempts left: {left}")));
        self.queue.defer(id, index);
        self.spawn_unit_timer(id, Duration::from_secs(delay), Msg::RetryReady { id });
        true
    }

    /// Retry delay elapsed; re-queue the unit.
    pub(crate) fn on_retry_ready(&mut self, id: Uuid) {
        self.timers.remove(&id);
        // guard against timers for units that were promoted or removed
        let retrying = self
            .registry
            .get(id)
            .map(|u| u.base().state.current() == State::Retrying)
            .unwrap_or(false);
        if !retrying || !self.queue.promote(id) {
            return;
        }
        self.set_state(id, State::Waiting, Some("Retry delay elapsed".into()));
        self.start_workers();
    }
}
