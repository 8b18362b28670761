//! # Unit registry (arena).
//!
//! The [`Registry`] owns every admitted unit in a flat arena keyed by id.
//! Units reference each other (dependency parents, group members) by id
//! only, so the graph cannot form ownership cycles and removal is a plain
//! arena delete plus link cleanup.
//!
//! Admission resolves three things:
//! - the unique **name** (caller label, or `Task-{n}` / `Group-{n}` from
//!   per-kind sequences owned by the registry);
//! - the **admission index** (a single global sequence driving FIFO order);
//! - the **dependency parent** (a `wait_for` name resolved to an id).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::ExecError;
use crate::tasks::{Task, TaskBase, TaskGroup};

/// Monotonic counter; the registry owns one per naming kind plus one for
/// admission order.
#[derive(Debug, Default)]
pub(crate) struct SequenceGen {
    next: u64,
}

impl SequenceGen {
    /// Returns the next value, starting from 1.
    pub fn next(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// A registered task or group.
pub(crate) enum Unit {
    Task(Task),
    Group(TaskGroup),
}

impl Unit {
    pub fn base(&self) -> &TaskBase {
        match self {
            Unit::Task(t) => &t.base,
            Unit::Group(g) => &g.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut TaskBase {
        match self {
            Unit::Task(t) => &mut t.base,
            Unit::Group(g) => &mut g.base,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Unit::Task(_) => "task",
            Unit::Group(_) => "group",
        }
    }

    pub fn inspect(&self) -> Value {
        match self {
            Unit::Task(t) => t.inspect(),
            Unit::Group(g) => g.inspect(),
        }
    }
}

/// Arena of admitted units with name and dependency bookkeeping.
pub(crate) struct Registry {
    units: HashMap<Uuid, Unit>,
    by_name: HashMap<String, Uuid>,
    admission_seq: SequenceGen,
    task_names: SequenceGen,
    group_names: SequenceGen,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            by_name: HashMap::new(),
            admission_seq: SequenceGen::default(),
            task_names: SequenceGen::default(),
            group_names: SequenceGen::default(),
        }
    }

    /// Admits a unit: assigns name and admission index, resolves the
    /// `wait_for` parent, and links it into the arena.
    pub fn admit(&mut self, mut unit: Unit) -> Result<Uuid, ExecError> {
        let name = match unit.base().label.clone() {
            Some(label) => label,
            None => match unit {
                Unit::Task(_) => format!("Task-{}", self.task_names.next()),
                Unit::Group(_) => format!("Group-{}", self.group_names.next()),
            },
        };
        if self.by_name.contains_key(&name) {
            return Err(ExecError::DuplicateAdmission { name });
        }

        let parent = match unit.base_mut().wait_for.take() {
            Some(pname) => match self.by_name.get(&pname) {
                Some(pid) => Some(*pid),
                None => return Err(ExecError::NotFound { name: pname }),
            },
            None => None,
        };

        let uid = {
            let base = unit.base_mut();
            base.name = Arc::from(name.as_str());
            base.index = self.admission_seq.next();
            base.parent = parent;
            base.uid
        };

        if let Some(pid) = parent {
            if let Some(p) = self.units.get_mut(&pid) {
                p.base_mut().children.push(uid);
            }
        }
        self.by_name.insert(name, uid);
        self.units.insert(uid, unit);
        Ok(uid)
    }

    pub fn get(&self, id: Uuid) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Resolves a name to a unit id.
    pub fn resolve(&self, name: &str) -> Option<Uuid> {
        self.by_name.get(name).copied()
    }

    pub fn unit_name(&self, id: Uuid) -> Option<Arc<str>> {
        self.units.get(&id).map(|u| Arc::clone(&u.base().name))
    }

    /// Ids of units that `wait_for` this one (direct dependents).
    pub fn children_of(&self, id: Uuid) -> Vec<Uuid> {
        self.units
            .get(&id)
            .map(|u| u.base().children.clone())
            .unwrap_or_default()
    }

    /// Deletes a unit from the arena and severs every link to it.
    pub fn remove(&mut self, id: Uuid) -> Option<Unit> {
        let unit = self.units.remove(&id)?;
        self.by_name.remove(unit.base().name.as_ref() as &str);

        if let Some(pid) = unit.base().parent {
            if let Some(p) = self.units.get_mut(&pid) {
                p.base_mut().children.retain(|c| *c != id);
            }
        }
        for child in &unit.base().children {
            if let Some(c) = self.units.get_mut(child) {
                c.base_mut().parent = None;
            }
        }
        Some(unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }
}
