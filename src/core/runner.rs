//! # Worker tasks.
//!
//! Workers are plain `tokio::spawn`ed tasks. They own no scheduler state:
//! every observation flows back to the coordinator as a message, so the
//! coordinator remains the single writer.
//!
//! - A **task worker** runs one work attempt with panic isolation and
//!   reports exactly one outcome.
//! - A **group runner** waits for one outcome per member on a dedicated
//!   channel (the coordinator forwards member outcomes into it, including
//!   pre-notifications for members that were already terminal at group
//!   start) and reports the aggregate.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::executor::Msg;
use crate::error::TaskError;
use crate::events::Bus;
use crate::tasks::{DataBag, TaskContext, WorkRef};

/// Outcome notification for one group member.
pub(crate) type MemberOutcome = (Arc<str>, Result<(), TaskError>);

pub(crate) fn spawn_task_worker(
    id: Uuid,
    name: Arc<str>,
    work: WorkRef,
    data: DataBag,
    bus: Bus,
    tx: mpsc::UnboundedSender<Msg>,
) {
    tokio::spawn(async move {
        let ctx = TaskContext {
            id,
            name: Arc::clone(&name),
            data,
            bus,
        };
        let outcome = match AssertUnwindSafe(work.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(TaskError::Panic {
                error: panic_message(payload),
            }),
        };
        let _ = tx.send(Msg::TaskOutcome { id, outcome });
    });
}

pub(crate) fn spawn_group_runner(
    id: Uuid,
    name: Arc<str>,
    expected: usize,
    mut outcomes: mpsc::UnboundedReceiver<MemberOutcome>,
    tx: mpsc::UnboundedSender<Msg>,
) {
    tokio::spawn(async move {
        let mut failed: Vec<Arc<str>> = Vec::new();
        for _ in 0..expected {
            match outcomes.recv().await {
                Some((_, Ok(()))) => {}
                Some((member, Err(err))) => {
                    tracing::debug!(group = %name, member = %member, error = %err, "member failed");
                    failed.push(member);
                }
                // coordinator dropped the watch (shutdown); settle with what we have
                None => break,
            }
        }
        let outcome = if failed.is_empty() {
            Ok(())
        } else {
            let names: Vec<&str> = failed.iter().map(|n| n.as_ref()).collect();
            Err(TaskError::fail(format!("member(s) failed: {}", names.join(", "))))
        };
        let _ = tx.send(Msg::GroupOutcome { id, outcome });
    });
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
