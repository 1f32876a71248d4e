//! Cancellable one-shot tasks on a simulated millisecond clock.
//!
//! Tasks never fire on their own: the owner advances the clock and pops
//! what is due. Tasks due at the same instant pop in scheduling order.

use std::collections::BTreeMap;

use rn_core::{IdAlloc, TaskId};

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now_ms: u64,
    ids: IdAlloc,
    queue: BTreeMap<(u64, TaskId), T>,
    due: BTreeMap<TaskId, u64>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now_ms: 0,
            ids: IdAlloc::new(),
            queue: BTreeMap::new(),
            due: BTreeMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Run `task` once `delay_ms` has elapsed. Zero delay is due at once.
    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TaskId {
        let id = self.ids.next_id();
        let at = self.now_ms.saturating_add(delay_ms);
        self.queue.insert((at, id), task);
        self.due.insert(id, at);
        id
    }

    /// Drop a pending task. Returns it if it had not fired yet.
    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        let at = self.due.remove(&id)?;
        self.queue.remove(&(at, id))
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.due.contains_key(&id)
    }

    /// Time the earliest pending task is due.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return the earliest task due by now.
    pub fn pop_due(&mut self) -> Option<(TaskId, T)> {
        let (&(at, id), _) = self.queue.iter().next()?;
        if at > self.now_ms {
            return None;
        }
        self.due.remove(&id);
        self.queue.remove(&(at, id)).map(|task| (id, task))
    }

    /// Move the clock forward. Time never runs backwards.
    pub fn advance_to(&mut self, at_ms: u64) {
        assert!(at_ms >= self.now_ms, "scheduler clock moved backwards");
        self.now_ms = at_ms;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
