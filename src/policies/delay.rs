//! # Delay strategies for retry scheduling.
//!
//! [`DelayStrategy`] controls how long a failed unit waits before it is
//! re-queued. The delay is derived purely from the attempt number, so
//! the schedule is deterministic and never feeds back into itself.
//!
//! # Example
//! ```rust
//! use taskhive::DelayStrategy;
//!
//! let delay = DelayStrategy::exponential(2, 2);
//! assert_eq!(delay.delay_for(0), 2);   // 2 × 2^0
//! assert_eq!(delay.delay_for(3), 16);  // 2 × 2^3
//! assert_eq!(delay.delay_for(10), 60); // capped
//! ```

use serde_json::{json, Value};

/// Default cap for [`DelayStrategy::Linear`] delays, in seconds.
pub const LINEAR_DELAY_CAP: u64 = 300;

/// Default cap for [`DelayStrategy::Exponential`] delays, in seconds.
pub const EXPONENTIAL_DELAY_CAP: u64 = 60;

/// Retry delay schedule, in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelayStrategy {
    /// The same delay for every attempt.
    Fixed {
        /// Delay in seconds.
        base: u64,
    },

    /// Delay grows by `base` each attempt: `base + base × attempt`, capped.
    Linear {
        /// Initial delay and per-attempt increment, in seconds.
        base: u64,
        /// Maximum delay cap, in seconds.
        max: u64,
    },

    /// Delay grows geometrically: `base × multiplier^attempt`, capped.
    Exponential {
        /// Initial delay in seconds.
        base: u64,
        /// Multiplicative growth factor.
        multiplier: u64,
        /// Maximum delay cap, in seconds.
        max: u64,
    },
}

impl DelayStrategy {
    /// Fixed delay of `base` seconds.
    pub fn fixed(base: u64) -> Self {
        DelayStrategy::Fixed { base }
    }

    /// Linear growth from `base` seconds, capped at [`LINEAR_DELAY_CAP`].
    pub fn linear(base: u64) -> Self {
        DelayStrategy::Linear { base, max: LINEAR_DELAY_CAP }
    }

    /// Exponential growth from `base` seconds, capped at [`EXPONENTIAL_DELAY_CAP`].
    pub fn exponential(base: u64, multiplier: u64) -> Self {
        DelayStrategy::Exponential { base, multiplier, max: EXPONENTIAL_DELAY_CAP }
    }

    /// Computes the delay in seconds for the given attempt number (0-indexed).
    ///
    /// Overflow saturates and is then clamped to the strategy's cap.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        match *self {
            DelayStrategy::Fixed { base } => base,
            DelayStrategy::Linear { base, max } => {
                base.saturating_add(base.saturating_mul(u64::from(attempt))).min(max)
            }
            DelayStrategy::Exponential { base, multiplier, max } => {
                base.saturating_mul(multiplier.saturating_pow(attempt)).min(max)
            }
        }
    }

    /// Snapshot of the strategy parameters for debug surfaces.
    pub fn inspect(&self) -> Value {
        match *self {
            DelayStrategy::Fixed { base } => json!({"strategy": "fixed", "base": base}),
            DelayStrategy::Linear { base, max } => {
                json!({"strategy": "linear", "base": base, "max": max})
            }
            DelayStrategy::Exponential { base, multiplier, max } => {
                json!({"strategy": "exponential", "base": base, "multiplier": multiplier, "max": max})
            }
        }
    }
}

impl Default for DelayStrategy {
    /// One second, fixed.
    fn default() -> Self {
        DelayStrategy::Fixed { base: 1 }
    }
}
