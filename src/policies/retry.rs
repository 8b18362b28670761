//! # Retry policies for failed units.
//!
//! A [`RetryPolicy`] owns the attempt counter for its unit and decides,
//! per failure, whether the unit should be re-queued after a delay or
//! failed terminally.
//!
//! ## Decision protocol
//! [`RetryPolicy::should_retry`] returns a [`RetryDecision`]:
//! - [`Retry`](RetryDecision::Retry) — schedule another attempt after
//!   [`RetryPolicy::get_delay`] seconds;
//! - [`Fail`](RetryDecision::Fail) — the budget or a match rule forbids a retry;
//! - [`Success`](RetryDecision::Success) — the failure is accepted as-is:
//!   the policy never retries ([`RetryPolicy::no_retry`]), or a
//!   [`conditional`](RetryPolicy::conditional) stop criterion was met.
//!
//! In both non-`Retry` cases the unit fails; the distinction only affects
//! logging.
//!
//! ## Attempt counting
//! `get_delay()` reads the counter **before** it is advanced, so the first
//! retry waits `delay_for(0)`, the second `delay_for(1)`, and so on.
//! Manual "Reset & Retry" does **not** reset the counter; only
//! [`RetryPolicy::reset`] does.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::TaskError;
use crate::policies::delay::DelayStrategy;

/// Outcome of consulting a retry policy about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Accept the failure as-is; no retry wanted.
    Success,
    /// Schedule another attempt.
    Retry,
    /// Retry budget exhausted or failure excluded from retrying.
    Fail,
}

/// Predicate over a failure, used by [`RetryPolicy::conditional`].
pub type RetryCondition = Arc<dyn Fn(&TaskError) -> bool + Send + Sync>;

enum RetryKind {
    NoRetry,
    Simple {
        max: u32,
        delay: DelayStrategy,
    },
    Conditional {
        max: u32,
        delay: DelayStrategy,
        condition: RetryCondition,
    },
    Exceptions {
        max: u32,
        delay: DelayStrategy,
        retry_on: Vec<String>,
        never_retry_on: Vec<String>,
    },
}

/// Retry policy with an internal attempt counter.
pub struct RetryPolicy {
    kind: RetryKind,
    attempt: u32,
}

impl RetryPolicy {
    /// Never retries; failures are accepted.
    pub fn no_retry() -> Self {
        Self { kind: RetryKind::NoRetry, attempt: 0 }
    }

    /// Retries every failure up to `max` times with the given schedule.
    pub fn simple(max: u32, delay: DelayStrategy) -> Self {
        Self {
            kind: RetryKind::Simple { max, delay },
            attempt: 0,
        }
    }

    /// Retries until `condition` holds for the failure, up to `max` times.
    ///
    /// A true condition means the stop criterion is met: the failure is
    /// accepted as-is ([`RetryDecision::Success`]). While the condition is
    /// false the unit keeps retrying. If the condition panics, the failure
    /// is treated as non-retryable.
    pub fn conditional(
        max: u32,
        delay: DelayStrategy,
        condition: impl Fn(&TaskError) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: RetryKind::Conditional {
                max,
                delay,
                condition: Arc::new(condition),
            },
            attempt: 0,
        }
    }

    /// Retries based on the failure label (see [`TaskError::as_label`]).
    ///
    /// - Labels in `never_retry_on` always fail, regardless of `retry_on`.
    /// - Only labels listed in `retry_on` retry; everything else fails, so
    ///   an empty `retry_on` retries nothing.
    pub fn exceptions(
        max: u32,
        delay: DelayStrategy,
        retry_on: impl IntoIterator<Item = impl Into<String>>,
        never_retry_on: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            kind: RetryKind::Exceptions {
                max,
                delay,
                retry_on: retry_on.into_iter().map(Into::into).collect(),
                never_retry_on: never_retry_on.into_iter().map(Into::into).collect(),
            },
            attempt: 0,
        }
    }

    /// Simple policy with a fixed delay of `secs` seconds.
    pub fn fixed(max: u32, secs: u64) -> Self {
        Self::simple(max, DelayStrategy::fixed(secs))
    }

    /// Simple policy with a linearly growing delay.
    pub fn linear(max: u32, base: u64) -> Self {
        Self::simple(max, DelayStrategy::linear(base))
    }

    /// Simple policy with an exponentially growing delay.
    pub fn exponential(max: u32, base: u64, multiplier: u64) -> Self {
        Self::simple(max, DelayStrategy::exponential(base, multiplier))
    }

    /// Decides whether `err` should trigger another attempt.
    pub fn should_retry(&self, err: &TaskError) -> RetryDecision {
        match &self.kind {
            RetryKind::NoRetry => RetryDecision::Success,
            RetryKind::Simple { max, .. } => {
                if self.attempt < *max {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Fail
                }
            }
            RetryKind::Conditional { max, condition, .. } => {
                if self.attempt >= *max {
                    return RetryDecision::Fail;
                }
                let condition = Arc::clone(condition);
                match catch_unwind(AssertUnwindSafe(|| condition(err))) {
                    // condition satisfied: accept the failure, stop retrying
                    Ok(true) => RetryDecision::Success,
                    Ok(false) => RetryDecision::Retry,
                    Err(_) => {
                        tracing::error!("retry condition panicked; treating failure as terminal");
                        RetryDecision::Fail
                    }
                }
            }
            RetryKind::Exceptions { max, retry_on, never_retry_on, .. } => {
                if self.attempt >= *max {
                    return RetryDecision::Fail;
                }
                let label = err.as_label();
                if never_retry_on.iter().any(|l| l == label) {
                    return RetryDecision::Fail;
                }
                if retry_on.iter().any(|l| l == label) {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Fail
                }
            }
        }
    }

    /// Delay in seconds before the next attempt.
    ///
    /// Reads the attempt counter **before** [`RetryPolicy::advance`] bumps it.
    pub fn get_delay(&self) -> u64 {
        match &self.kind {
            RetryKind::NoRetry => 0,
            RetryKind::Simple { delay, .. }
            | RetryKind::Conditional { delay, .. }
            | RetryKind::Exceptions { delay, .. } => delay.delay_for(self.attempt),
        }
    }

    /// Consumes one attempt.
    pub fn advance(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Resets the attempt counter to zero.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts consumed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Maximum number of retries this policy allows.
    pub fn max(&self) -> u32 {
        match &self.kind {
            RetryKind::NoRetry => 0,
            RetryKind::Simple { max, .. }
            | RetryKind::Conditional { max, .. }
            | RetryKind::Exceptions { max, .. } => *max,
        }
    }

    /// Retries remaining in the budget.
    pub fn attempts_left(&self) -> u32 {
        self.max().saturating_sub(self.attempt)
    }

    fn kind_label(&self) -> &'static str {
        match &self.kind {
            RetryKind::NoRetry => "no_retry",
            RetryKind::Simple { .. } => "simple",
            RetryKind::Conditional { .. } => "conditional",
            RetryKind::Exceptions { .. } => "exceptions",
        }
    }

    /// Snapshot of the policy for debug surfaces.
    pub fn inspect(&self) -> Value {
        let mut out = json!({
            "policy": self.kind_label(),
            "attempt": self.attempt,
            "max": self.max(),
        });
        match &self.kind {
            RetryKind::NoRetry => {}
            RetryKind::Simple { delay, .. } | RetryKind::Conditional { delay, .. } => {
                out["delay"] = delay.inspect();
            }
            RetryKind::Exceptions { delay, retry_on, never_retry_on, .. } => {
                out["delay"] = delay.inspect();
                out["retry_on"] = json!(retry_on);
                out["never_retry_on"] = json!(never_retry_on);
            }
        }
        out
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("kind", &self.kind_label())
            .field("attempt", &self.attempt)
            .field("max", &self.max())
            .finish()
    }
}
