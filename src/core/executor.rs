//! # Executor handle and coordinator loop.
//!
//! [`Executor`] is the public, cloneable handle. Every command is sent as
//! a [`Msg`] over an unbounded channel to the [`Core`] task, which owns
//! *all* scheduler state (registry, queue, tracker, timers, worker
//! accounting). Workers and timers are spawned tasks that only ever talk
//! back through the same channel, so state mutation is single-threaded by
//! construction and outcome ordering follows message arrival order.
//!
//! ```text
//!   Executor ──Msg──► Core (single owner) ──spawn──► task workers
//!      ▲                │  ▲                            │
//!      │                │  └────────── Msg ─────────────┘
//!   subscribe()         ▼
//!      └───────────── Bus (broadcast events)
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::core::gate::GateDecision;
use crate::core::registry::{Registry, Unit};
use crate::core::runner::{self, MemberOutcome};
use crate::core::tracker::StatusTracker;
use crate::error::{ExecError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::queue::ReadyQueue;
use crate::tasks::{HookKind, State, Task, TaskGroup};

/// Commands and internal notifications processed by the coordinator.
pub(crate) enum Msg {
    AddTask {
        task: Task,
        reply: oneshot::Sender<Result<String, ExecError>>,
    },
    AddGroup {
        group: TaskGroup,
        reply: oneshot::Sender<Result<String, ExecError>>,
    },
    StartWorkers {
        reply: oneshot::Sender<Result<(), ExecError>>,
    },
    Remove {
        name: String,
        reply: oneshot::Sender<Result<(), ExecError>>,
    },
    Retry {
        name: String,
        reply: oneshot::Sender<Result<(), ExecError>>,
    },
    RunAction {
        name: String,
        action: String,
        reply: oneshot::Sender<Result<(), ExecError>>,
    },
    SetMaxWorkers {
        max: usize,
        reply: oneshot::Sender<Result<(), ExecError>>,
    },
    Inspect {
        name: String,
        reply: oneshot::Sender<Result<Value, ExecError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },

    // internal notifications
    TaskOutcome { id: Uuid, outcome: Result<(), TaskError> },
    GroupOutcome { id: Uuid, outcome: Result<(), TaskError> },
    RetryReady { id: Uuid },
    PredicateTick { id: Uuid },
    IdleElapsed,
}

/// Handle to a running executor.
///
/// Cheap to clone; all clones drive the same coordinator. Dropping every
/// handle closes the command channel and stops the coordinator once its
/// in-flight work settles.
#[derive(Clone)]
pub struct Executor {
    tx: mpsc::UnboundedSender<Msg>,
    bus: Bus,
}

impl Executor {
    /// Spawns a coordinator with the given configuration.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: Config) -> Self {
        let bus = Bus::new(config.bus_capacity);
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Core::new(config, bus.clone(), tx.clone(), rx);
        tokio::spawn(core.run());
        Self { tx, bus }
    }

    /// Registers a task. It sits `waiting` until [`Executor::start_workers`].
    ///
    /// Returns the assigned unique name (`Task-{n}` for unlabeled tasks).
    pub async fn add_task(&self, task: Task) -> Result<String, ExecError> {
        self.request(|reply| Msg::AddTask { task, reply }).await
    }

    /// Registers a group. Members stay staged until the group dispatches.
    ///
    /// Returns the assigned unique name (`Group-{n}` for unlabeled groups).
    pub async fn add_group(&self, group: TaskGroup) -> Result<String, ExecError> {
        self.request(|reply| Msg::AddGroup { group, reply }).await
    }

    /// Dispatches queued units up to the worker budget.
    pub async fn start_workers(&self) -> Result<(), ExecError> {
        self.request(|reply| Msg::StartWorkers { reply }).await
    }

    /// Removes a unit and, cascading, its dependents and members.
    ///
    /// Refused with [`ExecError::NotRemovable`] while the unit is running
    /// or waiting out a retry delay.
    pub async fn remove(&self, name: &str) -> Result<(), ExecError> {
        self.request(|reply| Msg::Remove { name: name.into(), reply }).await
    }

    /// Re-queues a failed unit ("Reset & Retry").
    ///
    /// Failed dependents are re-queued along with it; retrying a member of
    /// a failed group retries the whole group. Consumed retry budgets are
    /// kept.
    pub async fn retry(&self, name: &str) -> Result<(), ExecError> {
        self.request(|reply| Msg::Retry { name: name.into(), reply }).await
    }

    /// Invokes a named action on a unit, honoring its visibility rule.
    pub async fn run_action(&self, name: &str, action: &str) -> Result<(), ExecError> {
        self.request(|reply| Msg::RunAction {
            name: name.into(),
            action: action.into(),
            reply,
        })
        .await
    }

    /// Adjusts the worker budget and dispatches into any freed capacity.
    pub async fn set_max_workers(&self, max: usize) -> Result<(), ExecError> {
        self.request(|reply| Msg::SetMaxWorkers { max, reply }).await
    }

    /// Debug snapshot of a unit (state history, retry policy, data bag).
    pub async fn inspect(&self, name: &str) -> Result<Value, ExecError> {
        self.request(|reply| Msg::Inspect { name: name.into(), reply }).await
    }

    /// Discards queued units, rejects new admissions, and resolves once
    /// in-flight workers settle. The executor is closed afterwards.
    pub async fn shutdown(&self) -> Result<(), ExecError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Msg::Shutdown { reply: reply_tx })
            .map_err(|_| ExecError::Closed)?;
        reply_rx.await.map_err(|_| ExecError::Closed)
    }

    /// New receiver for scheduler events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ExecError>>) -> Msg,
    ) -> Result<T, ExecError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(build(reply_tx)).map_err(|_| ExecError::Closed)?;
        reply_rx.await.map_err(|_| ExecError::Closed)?
    }
}

/// The coordinator: sole owner of scheduler state.
pub(crate) struct Core {
    pub(crate) config: Config,
    pub(crate) bus: Bus,
    pub(crate) tx: mpsc::UnboundedSender<Msg>,
    rx: mpsc::UnboundedReceiver<Msg>,
    pub(crate) registry: Registry,
    pub(crate) queue: ReadyQueue,
    pub(crate) tracker: StatusTracker,
    /// parent id → units parked until the parent completes.
    pub(crate) blocked_on_parent: HashMap<Uuid, Vec<Uuid>>,
    /// group id → member outcome channel of the running group worker.
    group_watch: HashMap<Uuid, mpsc::UnboundedSender<MemberOutcome>>,
    /// One outstanding timer (retry delay or predicate tick) per unit.
    pub(crate) timers: HashMap<Uuid, CancellationToken>,
    pub(crate) active_workers: usize,
    shutting_down: bool,
    shutdown_reply: Option<oneshot::Sender<()>>,
    stopped: bool,
}

impl Core {
    fn new(
        config: Config,
        bus: Bus,
        tx: mpsc::UnboundedSender<Msg>,
        rx: mpsc::UnboundedReceiver<Msg>,
    ) -> Self {
        let tracker = StatusTracker::new(config.idle_debounce);
        Self {
            config,
            bus,
            tx,
            rx,
            registry: Registry::new(),
            queue: ReadyQueue::new(),
            tracker,
            blocked_on_parent: HashMap::new(),
            group_watch: HashMap::new(),
            timers: HashMap::new(),
            active_workers: 0,
            shutting_down: false,
            shutdown_reply: None,
            stopped: false,
        }
    }

    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg);
            self.after_message();
            if self.stopped {
                break;
            }
        }
        tracing::debug!("coordinator stopped");
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::AddTask { task, reply } => {
                let _ = reply.send(self.add_task(task));
            }
            Msg::AddGroup { group, reply } => {
                let _ = reply.send(self.add_group(group));
            }
            Msg::StartWorkers { reply } => {
                self.start_workers();
                let _ = reply.send(Ok(()));
            }
            Msg::Remove { name, reply } => {
                let _ = reply.send(self.remove_by_name(&name));
            }
            Msg::Retry { name, reply } => {
                let _ = reply.send(self.retry_by_name(&name));
            }
            Msg::RunAction { name, action, reply } => {
                let _ = reply.send(self.run_action(&name, &action));
            }
            Msg::SetMaxWorkers { max, reply } => {
                self.config.max_workers = max.max(1);
                self.start_workers();
                let _ = reply.send(Ok(()));
            }
            Msg::Inspect { name, reply } => {
                let result = match self.registry.resolve(&name) {
                    Some(id) => self
                        .registry
                        .get(id)
                        .map(|u| u.inspect())
                        .ok_or(ExecError::NotFound { name }),
                    None => Err(ExecError::NotFound { name }),
                };
                let _ = reply.send(result);
            }
            Msg::Shutdown { reply } => self.begin_shutdown(reply),

            Msg::TaskOutcome { id, outcome } => {
                self.active_workers = self.active_workers.saturating_sub(1);
                match outcome {
                    Ok(()) => self.on_completed(id),
                    Err(err) => self.on_failed(id, err, true),
                }
            }
            Msg::GroupOutcome { id, outcome } => {
                self.active_workers = self.active_workers.saturating_sub(1);
                self.group_watch.remove(&id);
                match outcome {
                    Ok(()) => self.on_completed(id),
                    Err(err) => self.on_failed(id, err, true),
                }
            }
            Msg::RetryReady { id } => self.on_retry_ready(id),
            Msg::PredicateTick { id } => self.on_predicate_tick(id),
            Msg::IdleElapsed => self.on_idle_elapsed(),
        }
    }

    // ---- admission ----

    fn add_task(&mut self, task: Task) -> Result<String, ExecError> {
        let id = self.admit_unit(Unit::Task(task))?;
        Ok(self
            .registry
            .unit_name(id)
            .map(|n| n.to_string())
            .unwrap_or_default())
    }

    fn add_group(&mut self, group: TaskGroup) -> Result<String, ExecError> {
        if group.is_empty() {
            return Err(ExecError::EmptyGroup {
                name: group.base.label.clone().unwrap_or_else(|| "<unnamed>".into()),
            });
        }
        let id = self.admit_unit(Unit::Group(group))?;
        Ok(self
            .registry
            .unit_name(id)
            .map(|n| n.to_string())
            .unwrap_or_default())
    }

    /// Registers a unit, wires its observer, publishes `TaskAdded`, and
    /// queues it. Dispatch stays explicit (`start_workers`).
    pub(crate) fn admit_unit(&mut self, unit: Unit) -> Result<Uuid, ExecError> {
        if self.shutting_down {
            return Err(ExecError::ShuttingDown);
        }
        let kind = unit.kind_label();
        let id = self.registry.admit(unit)?;

        let observer = self.tracker.observer();
        let (name, index) = match self.registry.get_mut(id) {
            Some(unit) => {
                let base = unit.base_mut();
                base.state.attach_observer(observer);
                (Arc::clone(&base.name), base.index)
            }
            None => return Err(ExecError::NotFound { name: id.to_string() }),
        };

        self.bus
            .publish(Event::new(EventKind::TaskAdded).with_task(Arc::clone(&name)));
        self.set_state(id, State::Waiting, Some("Queued".into()));
        self.queue.push(id, index);
        tracing::debug!(task = %name, kind, "admitted");
        Ok(id)
    }

    // ---- dispatch ----

    /// Pops ready units through the admission gate until the queue is
    /// empty or the budget is used up.
    ///
    /// The `<=` grants one slot beyond `max_workers`: a dispatched group
    /// occupies a slot while it waits, and must not starve its members.
    pub(crate) fn start_workers(&mut self) {
        if self.shutting_down {
            return;
        }
        while !self.queue.ready_is_empty() && self.active_workers <= self.config.max_workers_clamped()
        {
            let Some(id) = self.queue.pop() else { break };
            match self.gate_admit(id) {
                GateDecision::Proceed => self.dispatch(id),
                GateDecision::Parked => continue,
                GateDecision::Rejected(err) => {
                    let allow_retry = matches!(err, TaskError::ParentFailed { .. });
                    self.on_failed(id, err, allow_retry);
                }
            }
        }
    }

    fn dispatch(&mut self, id: Uuid) {
        match self.registry.get(id) {
            Some(Unit::Task(_)) => self.dispatch_task(id),
            Some(Unit::Group(_)) => self.dispatch_group(id),
            None => {}
        }
    }

    fn dispatch_task(&mut self, id: Uuid) {
        let (name, work, data, attempt) = match self.registry.get(id) {
            Some(Unit::Task(task)) => (
                Arc::clone(&task.base.name),
                Arc::clone(&task.work),
                task.base.data.clone(),
                task.base.retry.attempt(),
            ),
            _ => return,
        };
        // the start hook observes the pre-running state
        self.fire_hook(id, HookKind::OnStart);
        self.set_state(id, State::Running, Some("Started".into()));
        self.bus.publish(
            Event::new(EventKind::RunnerStarted)
                .with_task(Arc::clone(&name))
                .with_attempt(attempt + 1),
        );
        self.active_workers += 1;
        runner::spawn_task_worker(id, name, work, data, self.bus.clone(), self.tx.clone());
    }

    fn dispatch_group(&mut self, id: Uuid) {
        let (name, attempt) = match self.registry.get(id) {
            Some(unit) => (Arc::clone(&unit.base().name), unit.base().retry.attempt()),
            None => return,
        };
        self.fire_hook(id, HookKind::OnStart);
        self.set_state(id, State::Running, Some("Started".into()));
        self.bus.publish(
            Event::new(EventKind::RunnerStarted)
                .with_task(Arc::clone(&name))
                .with_attempt(attempt + 1),
        );

        // first dispatch: admit the staged members
        let staged = match self.registry.get_mut(id) {
            Some(Unit::Group(group)) => std::mem::take(&mut group.staged),
            _ => Vec::new(),
        };
        let mut admitted = Vec::new();
        for mut task in staged {
            task.group = Some(id);
            match self.admit_unit(Unit::Task(task)) {
                Ok(mid) => admitted.push(mid),
                Err(err) => {
                    tracing::warn!(group = %name, error = %err, "member admission skipped");
                }
            }
        }
        let members = match self.registry.get_mut(id) {
            Some(Unit::Group(group)) => {
                group.members.extend(admitted);
                group.members.clone()
            }
            _ => admitted,
        };

        // snapshot member states, then wire the watch
        let mut snapshots = Vec::with_capacity(members.len());
        for mid in members {
            if let Some(member) = self.registry.get(mid) {
                let base = member.base();
                snapshots.push((
                    mid,
                    Arc::clone(&base.name),
                    base.state.current(),
                    base.index,
                    base.error.clone(),
                ));
            }
        }

        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        let expected = snapshots.len();
        for (mid, mname, state, index, error) in snapshots {
            match state {
                State::Completed => {
                    let _ = watch_tx.send((mname, Ok(())));
                }
                State::Failed | State::Deleted => {
                    let reason = error.unwrap_or_else(|| "failed".into());
                    let _ = watch_tx.send((mname, Err(TaskError::fail(reason))));
                }
                State::Initialized => {
                    // member reset by a group retry; queue it again
                    self.set_state(mid, State::Waiting, Some("Queued".into()));
                    self.queue.push(mid, index);
                }
                _ => {}
            }
        }
        self.group_watch.insert(id, watch_tx);
        self.active_workers += 1;
        runner::spawn_group_runner(id, name, expected, watch_rx, self.tx.clone());
    }

    // ---- terminal outcomes ----

    fn on_completed(&mut self, id: Uuid) {
        let Some(name) = self.registry.unit_name(id) else { return };
        self.set_state(id, State::Completed, Some("Done".into()));
        self.fire_hook(id, HookKind::OnCompleted);
        self.fire_hook(id, HookKind::OnFinish);
        self.bus
            .publish(Event::new(EventKind::TaskFinished).with_task(Arc::clone(&name)));
        self.bus
            .publish(Event::new(EventKind::RunnerCompleted).with_task(Arc::clone(&name)));
        self.notify_group(id, Ok(()));

        if let Some(blocked) = self.blocked_on_parent.remove(&id) {
            for child in blocked {
                let Some(index) = self.registry.get(child).map(|u| u.base().index) else {
                    continue;
                };
                self.set_state(
                    child,
                    State::Waiting,
                    Some(format!("Unblock from parent: {name}")),
                );
                self.queue.push(child, index);
            }
        }
        self.start_workers();
    }

    /// Terminal failure path, shared by worker outcomes, gate rejections,
    /// predicate exhaustion, and dependency cascades.
    pub(crate) fn on_failed(&mut self, id: Uuid, err: TaskError, allow_retry: bool) {
        let Some(name) = self.registry.unit_name(id) else { return };
        if allow_retry && !self.shutting_down && self.handle_failure(id, &err) {
            return; // another attempt is scheduled
        }
        tracing::warn!(task = %name, error = %err, "unit failed");

        let attempt = {
            let Some(unit) = self.registry.get_mut(id) else { return };
            let base = unit.base_mut();
            base.error = Some(err.to_string());
            base.retry.attempt()
        };
        self.fire_hook(id, HookKind::OnFailed);
        self.fire_hook(id, HookKind::OnFinish);
        self.bus
            .publish(Event::new(EventKind::TaskFinished).with_task(Arc::clone(&name)));
        self.bus.publish(
            Event::new(EventKind::RunnerFailed)
                .with_task(Arc::clone(&name))
                .with_reason(err.to_string())
                .with_attempt(attempt + 1),
        );

        // dependents parked on this unit fail before it settles
        if let Some(blocked) = self.blocked_on_parent.remove(&id) {
            for child in blocked {
                self.on_failed(
                    child,
                    TaskError::ParentFailed { parent: name.to_string() },
                    true,
                );
            }
        }

        self.queue.remove(id);
        self.cancel_timer(id);
        self.set_state(id, State::Failed, Some(err.to_string()));
        self.notify_group(id, Err(err));
        self.start_workers();
    }

    /// Forwards a member outcome to its group's running worker, if any.
    fn notify_group(&mut self, id: Uuid, outcome: Result<(), TaskError>) {
        let gid = match self.registry.get(id) {
            Some(Unit::Task(task)) => task.group,
            _ => None,
        };
        let Some(gid) = gid else { return };
        if let Some(watch) = self.group_watch.get(&gid) {
            if let Some(name) = self.registry.unit_name(id) {
                let _ = watch.send((name, outcome));
            }
        }
    }

    // ---- removal ----

    fn remove_by_name(&mut self, name: &str) -> Result<(), ExecError> {
        let id = self
            .registry
            .resolve(name)
            .ok_or_else(|| ExecError::NotFound { name: name.into() })?;
        self.remove_unit(id)
    }

    /// Removes a unit, cascading to dependents and group members first.
    ///
    /// Non-removable descendants are skipped with a warning; once their
    /// parent is gone they fail at the gate instead.
    fn remove_unit(&mut self, id: Uuid) -> Result<(), ExecError> {
        let (name, state) = match self.registry.get(id) {
            Some(unit) => (Arc::clone(&unit.base().name), unit.base().state.current()),
            None => return Ok(()), // already gone via a cascade
        };
        if !state.is_removable() {
            return Err(ExecError::NotRemovable { name: name.to_string(), state });
        }

        for child in self.registry.children_of(id) {
            if let Err(err) = self.remove_unit(child) {
                tracing::warn!(task = %name, error = %err, "dependent not removed");
            }
        }
        if let Some(Unit::Group(group)) = self.registry.get(id) {
            for member in group.members.clone() {
                if let Err(err) = self.remove_unit(member) {
                    tracing::warn!(group = %name, error = %err, "member not removed");
                }
            }
        }

        self.cancel_timer(id);
        self.queue.remove(id);
        for parked in self.blocked_on_parent.values_mut() {
            parked.retain(|c| *c != id);
        }
        self.notify_group(id, Err(TaskError::fail("removed")));

        if let Some(unit) = self.registry.get_mut(id) {
            let base = unit.base_mut();
            if let Some(pred) = base.predicate.as_mut() {
                pred.delete();
            }
            base.callbacks.delete();
            base.state.set(State::Deleted, Some("Removed".into()));
        }
        self.bus
            .publish(Event::new(EventKind::TaskRemoved).with_task(name));
        self.registry.remove(id);
        Ok(())
    }

    // ---- manual retry ----

    fn retry_by_name(&mut self, name: &str) -> Result<(), ExecError> {
        let id = self
            .registry
            .resolve(name)
            .ok_or_else(|| ExecError::NotFound { name: name.into() })?;
        self.retry_unit(id);
        self.start_workers();
        Ok(())
    }

    fn retry_unit(&mut self, id: Uuid) {
        let Some(state) = self.registry.get(id).map(|u| u.base().state.current()) else {
            return;
        };
        if state != State::Failed {
            tracing::warn!(state = %state, "retry ignored; unit is not failed");
            return;
        }
        // retrying a member of a failed group re-runs the whole group
        if let Some(Unit::Task(task)) = self.registry.get(id) {
            if let Some(gid) = task.group {
                let group_failed = self
                    .registry
                    .get(gid)
                    .map(|g| g.base().state.current() == State::Failed)
                    .unwrap_or(false);
                if group_failed {
                    return self.retry_unit(gid);
                }
            }
        }
        self.retry_tree(id);
    }

    /// Resets a failed unit and everything that failed underneath it,
    /// then queues it again. Retry budgets are deliberately not reset.
    fn retry_tree(&mut self, id: Uuid) {
        let index = {
            let Some(unit) = self.registry.get_mut(id) else { return };
            let base = unit.base_mut();
            base.error = None;
            if let Some(pred) = base.predicate.as_mut() {
                pred.reset();
            }
            base.state.set(State::Initialized, Some("Reset & Retry".into()));
            base.index
        };

        for child in self.registry.children_of(id) {
            let failed = self
                .registry
                .get(child)
                .map(|u| u.base().state.current() == State::Failed)
                .unwrap_or(false);
            if failed {
                self.retry_tree(child);
            }
        }
        if let Some(Unit::Group(group)) = self.registry.get(id) {
            for member in group.members.clone() {
                let failed = self
                    .registry
                    .get(member)
                    .map(|u| u.base().state.current() == State::Failed)
                    .unwrap_or(false);
                if failed {
                    self.retry_tree(member);
                }
            }
        }

        self.set_state(id, State::Waiting, Some("Queued".into()));
        self.queue.push(id, index);
    }

    // ---- actions ----

    fn run_action(&mut self, name: &str, action: &str) -> Result<(), ExecError> {
        let id = self
            .registry
            .resolve(name)
            .ok_or_else(|| ExecError::NotFound { name: name.into() })?;
        let (view, handler) = {
            let Some(unit) = self.registry.get(id) else {
                return Err(ExecError::NotFound { name: name.into() });
            };
            let base = unit.base();
            let state = base.state.current();
            match base.actions().iter().find(|a| a.name() == action) {
                Some(a) if a.visibility().allows(state) => (base.view(), a.handler()),
                _ => {
                    return Err(ExecError::ActionUnavailable {
                        task: name.into(),
                        action: action.into(),
                    })
                }
            }
        };
        if catch_unwind(AssertUnwindSafe(|| handler(&view))).is_err() {
            tracing::error!(task = name, action, "action panicked");
        }
        Ok(())
    }

    // ---- shutdown ----

    fn begin_shutdown(&mut self, reply: oneshot::Sender<()>) {
        if self.shutting_down {
            let _ = reply.send(());
            return;
        }
        self.shutting_down = true;
        tracing::info!(units = self.registry.len(), "shutdown requested");

        let mut discard: Vec<Uuid> = self.queue.drain();
        discard.extend(self.blocked_on_parent.drain().flat_map(|(_, parked)| parked));
        for id in discard {
            self.cancel_timer(id);
            let Some(name) = self.registry.unit_name(id) else { continue };
            self.notify_group(id, Err(TaskError::fail("shutdown")));
            if let Some(unit) = self.registry.get_mut(id) {
                let base = unit.base_mut();
                if let Some(pred) = base.predicate.as_mut() {
                    pred.delete();
                }
                base.callbacks.delete();
                base.state.set(State::Deleted, Some("Shutdown".into()));
            }
            self.bus.publish(
                Event::new(EventKind::TaskRemoved)
                    .with_task(name)
                    .with_reason("shutdown"),
            );
            self.registry.remove(id);
        }

        if self.active_workers == 0 {
            let _ = reply.send(());
            self.stopped = true;
        } else {
            self.shutdown_reply = Some(reply);
        }
    }

    // ---- per-message epilogue ----

    fn after_message(&mut self) {
        if let Some(counts) = self.tracker.take_changed() {
            self.bus
                .publish(Event::new(EventKind::StatusUpdated).with_counts(counts));
        }
        self.check_idle();
        if self.shutting_down && self.active_workers == 0 {
            if let Some(reply) = self.shutdown_reply.take() {
                let _ = reply.send(());
                self.stopped = true;
            }
        }
    }

    fn check_idle(&mut self) {
        if self.shutting_down {
            return;
        }
        let quiescent = self.tracker.snapshot().active() == 0
            && self.queue.is_empty()
            && self.active_workers == 0;
        if !quiescent {
            self.tracker.cancel_pending_idle();
            self.tracker.set_idle_notified(false);
            return;
        }
        if self.tracker.idle_notified() || self.tracker.has_pending_idle() {
            return;
        }
        let token = self.tracker.arm_idle();
        let debounce = self.tracker.debounce();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    let _ = tx.send(Msg::IdleElapsed);
                }
            }
        });
    }

    fn on_idle_elapsed(&mut self) {
        self.tracker.clear_pending_idle();
        let quiescent = self.tracker.snapshot().active() == 0
            && self.queue.is_empty()
            && self.active_workers == 0;
        if quiescent && !self.tracker.idle_notified() {
            self.bus.publish(Event::new(EventKind::SystemIdle));
            self.tracker.set_idle_notified(true);
            tracing::debug!("system idle");
        }
    }

    // ---- shared helpers ----

    pub(crate) fn set_state(&mut self, id: Uuid, state: State, comment: Option<String>) {
        if let Some(unit) = self.registry.get_mut(id) {
            unit.base_mut().state.set(state, comment);
        }
    }

    pub(crate) fn fire_hook(&mut self, id: Uuid, kind: HookKind) {
        if let Some(unit) = self.registry.get_mut(id) {
            let view = unit.base().view();
            unit.base_mut().callbacks.fire(kind, &view);
        }
    }

    pub(crate) fn spawn_unit_timer(&mut self, id: Uuid, delay: std::time::Duration, msg: Msg) {
        self.cancel_timer(id);
        let token = CancellationToken::new();
        self.timers.insert(id, token.clone());
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(msg);
                }
            }
        });
    }

    pub(crate) fn cancel_timer(&mut self, id: Uuid) {
        if let Some(token) = self.timers.remove(&id) {
            token.cancel();
        }
    }
}
