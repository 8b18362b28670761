//! Retry and delay policies.

mod delay;
mod retry;

pub use delay::{DelayStrategy, EXPONENTIAL_DELAY_CAP, LINEAR_DELAY_CAP};
pub use retry::{RetryCondition, RetryDecision, RetryPolicy};
