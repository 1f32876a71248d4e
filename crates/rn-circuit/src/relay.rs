//! Relays and push buttons: the shared state behind relay/button contact
//! nodes and the coil activity that drives a relay.

use std::collections::BTreeSet;

use rn_core::{NodeId, RelayId};
use rn_graph::{ButtonState, ContactPosition, RelayState};

/// A relay driven by its coil contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub name: String,
    /// Resting state before any coil has acted on the relay.
    pub normally_up: bool,
    state: RelayState,
    /// Coil contacts currently holding the relay up.
    active: BTreeSet<(NodeId, usize)>,
}

impl Relay {
    pub fn new(name: impl Into<String>, normally_up: bool) -> Self {
        Self {
            name: name.into(),
            normally_up,
            state: if normally_up {
                RelayState::Up
            } else {
                RelayState::Down
            },
            active: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RelayState) -> bool {
        let changed = self.state != state;
        self.state = state;
        changed
    }

    pub fn active_coils(&self) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        self.active.iter().copied()
    }

    /// Record a coil contact (de)activation and return the state the coils
    /// now call for.
    pub(crate) fn coil(&mut self, coil: (NodeId, usize), active: bool) -> RelayState {
        if active {
            self.active.insert(coil);
        } else {
            self.active.remove(&coil);
        }
        if self.active.is_empty() {
            RelayState::Down
        } else {
            RelayState::Up
        }
    }
}

/// Contact position a relay state puts its contacts in.
pub fn position_for(state: RelayState) -> ContactPosition {
    match state {
        RelayState::Up => ContactPosition::Up,
        RelayState::Down => ContactPosition::Down,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub name: String,
    pub state: ButtonState,
}

impl Button {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ButtonState::Normal,
        }
    }
}

/// Deferred coil contact transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CoilTask {
    pub(crate) relay: RelayId,
    pub(crate) coil: NodeId,
    pub(crate) contact: usize,
    pub(crate) activate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_is_up_while_any_coil_is_active() {
        let mut r = Relay::new("R1", false);
        assert_eq!(r.state(), RelayState::Down);
        let a = (NodeId::from_index(1), 0);
        let b = (NodeId::from_index(2), 1);
        assert_eq!(r.coil(a, true), RelayState::Up);
        assert_eq!(r.coil(b, true), RelayState::Up);
        assert_eq!(r.coil(a, false), RelayState::Up);
        assert_eq!(r.coil(b, false), RelayState::Down);
        assert_eq!(r.active_coils().count(), 0);
    }

    #[test]
    fn normally_up_sets_resting_state() {
        assert_eq!(Relay::new("R2", true).state(), RelayState::Up);
        assert_eq!(position_for(RelayState::Down), ContactPosition::Down);
    }
}
