//! Change notifications for observers (UI, CLI).
//!
//! The network only records edges: a contact counter crossing zero or a
//! cable's aggregate power changing. Observers drain the queue after each
//! public operation.

use rn_core::{CableId, CablePower, NodeId, RelayId};

/// Relay armature position reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayState {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ContactsChanged(NodeId),
    PowerChanged { cable: CableId, power: CablePower },
    RelayStateChanged { relay: RelayId, state: RelayState },
}

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<Event>,
}

impl EventQueue {
    pub fn push(&mut self, event: Event) {
        // Collapse bursts from one multi-passage registration.
        if self.events.last() == Some(&event) {
            return;
        }
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_duplicates_collapse() {
        let mut q = EventQueue::default();
        let n = NodeId::from_index(0);
        q.push(Event::ContactsChanged(n));
        q.push(Event::ContactsChanged(n));
        q.push(Event::ContactsChanged(NodeId::from_index(1)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.drain().len(), 2);
        assert!(q.is_empty());
    }
}
