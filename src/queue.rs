//! # Dual ready/deferred queue.
//!
//! [`ReadyQueue`] keeps dispatchable unit ids in a min-heap ordered by
//! admission index (stable FIFO), plus a deferred store for units waiting
//! out a retry delay or predicate tick. Deferred units are invisible to
//! `pop()` until promoted back.
//!
//! Arbitrary removal from the ready heap is O(n): the heap is scanned and
//! rebuilt. Queues are small enough that this has never mattered.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    index: u64,
    id: Uuid,
}

/// FIFO dispatch queue with a deferred side-store.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    ready: BinaryHeap<Reverse<Entry>>,
    /// id → admission index, for re-insertion on promote.
    deferred: HashMap<Uuid, u64>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a unit for dispatch.
    pub fn push(&mut self, id: Uuid, index: u64) {
        self.ready.push(Reverse(Entry { index, id }));
    }

    /// The oldest ready unit, without taking it.
    pub fn peek(&self) -> Option<Uuid> {
        self.ready.peek().map(|Reverse(e)| e.id)
    }

    /// Takes the oldest ready unit.
    pub fn pop(&mut self) -> Option<Uuid> {
        self.ready.pop().map(|Reverse(e)| e.id)
    }

    /// Parks a unit in the deferred store.
    pub fn defer(&mut self, id: Uuid, index: u64) {
        self.deferred.insert(id, index);
    }

    /// Moves a deferred unit back to the ready heap.
    ///
    /// Returns `false` if the unit was not deferred.
    pub fn promote(&mut self, id: Uuid) -> bool {
        match self.deferred.remove(&id) {
            Some(index) => {
                self.push(id, index);
                true
            }
            None => false,
        }
    }

    /// Removes a unit from wherever it sits.
    ///
    /// Returns `false` if the unit was in neither store.
    pub fn remove(&mut self, id: Uuid) -> bool {
        if self.deferred.remove(&id).is_some() {
            return true;
        }
        let before = self.ready.len();
        let entries: Vec<Reverse<Entry>> =
            self.ready.drain().filter(|Reverse(e)| e.id != id).collect();
        self.ready = entries.into();
        self.ready.len() != before
    }

    pub fn is_deferred(&self, id: Uuid) -> bool {
        self.deferred.contains_key(&id)
    }

    pub fn ready_is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.deferred.is_empty()
    }

    /// Empties both stores, returning every id (shutdown drain).
    pub fn drain(&mut self) -> Vec<Uuid> {
        let mut out: Vec<Uuid> = self.ready.drain().map(|Reverse(e)| e.id).collect();
        out.extend(self.deferred.drain().map(|(id, _)| id));
        out
    }
}
