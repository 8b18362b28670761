//! # Coordinator internals.
//!
//! Everything in here runs on (or is owned by) the single coordinator
//! task. Only [`Executor`] is public.

mod executor;
mod gate;
mod registry;
mod retry;
mod runner;
mod tracker;

pub use executor::Executor;
