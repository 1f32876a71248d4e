//! Node contacts and their per-pole circuit counters.

use rn_core::{AnyCircuit, CableId, CircuitKind, ContactType, Pole, Side};

/// Direction of a circuit relative to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Current enters the node through the contact.
    Entrance,
    /// Current leaves the node through the contact.
    Exit,
}

impl Flow {
    fn index(self) -> usize {
        match self {
            Flow::Entrance => 0,
            Flow::Exit => 1,
        }
    }
}

/// Which cable end a contact is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CableBinding {
    pub cable: CableId,
    pub side: Side,
}

/// A contact together with a pole, as produced by wiring tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactPole {
    pub contact: usize,
    pub pole: Pole,
}

impl ContactPole {
    pub fn new(contact: usize, pole: Pole) -> Self {
        Self { contact, pole }
    }
}

/// A connection point on a node.
///
/// Invariant: `binding` is set iff at least one pole is not `NotConnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub pole_names: [&'static str; 2],
    pub(crate) binding: Option<CableBinding>,
    pub(crate) types: [ContactType; 2],
    /// `[kind][pole][flow]`
    counters: [[[u32; 2]; 2]; 2],
}

impl Contact {
    pub fn new(first: &'static str, second: &'static str) -> Self {
        Self {
            pole_names: [first, second],
            binding: None,
            types: [ContactType::NotConnected; 2],
            counters: [[[0; 2]; 2]; 2],
        }
    }

    pub fn binding(&self) -> Option<CableBinding> {
        self.binding
    }

    pub fn cable(&self) -> Option<CableId> {
        self.binding.map(|b| b.cable)
    }

    pub fn contact_type(&self, pole: Pole) -> ContactType {
        self.types[pole.index()]
    }

    pub fn count(&self, kind: CircuitKind, pole: Pole, flow: Flow) -> u32 {
        self.counters[kind.index()][pole.index()][flow.index()]
    }

    pub fn has_circuit(&self, kind: CircuitKind, pole: Pole) -> bool {
        self.count(kind, pole, Flow::Entrance) > 0 || self.count(kind, pole, Flow::Exit) > 0
    }

    /// Strongest circuit on this pole, in either direction.
    pub fn any_on_pole(&self, pole: Pole) -> AnyCircuit {
        if self.has_circuit(CircuitKind::Closed, pole) {
            AnyCircuit::Closed
        } else if self.has_circuit(CircuitKind::Open, pole) {
            AnyCircuit::Open
        } else {
            AnyCircuit::None
        }
    }

    /// Strongest circuit on this pole flowing in `flow` direction.
    pub fn any_flow_on_pole(&self, pole: Pole, flow: Flow) -> AnyCircuit {
        if self.count(CircuitKind::Closed, pole, flow) > 0 {
            AnyCircuit::Closed
        } else if self.count(CircuitKind::Open, pole, flow) > 0 {
            AnyCircuit::Open
        } else {
            AnyCircuit::None
        }
    }

    pub fn any(&self) -> AnyCircuit {
        self.any_on_pole(Pole::First).max(self.any_on_pole(Pole::Second))
    }

    pub fn is_idle(&self) -> bool {
        self.counters.iter().flatten().flatten().all(|c| *c == 0)
    }

    /// Returns true on a 0 -> 1 transition.
    pub(crate) fn increment(&mut self, kind: CircuitKind, pole: Pole, flow: Flow) -> bool {
        let slot = &mut self.counters[kind.index()][pole.index()][flow.index()];
        *slot += 1;
        *slot == 1
    }

    /// Returns true on a 1 -> 0 transition.
    pub(crate) fn decrement(&mut self, kind: CircuitKind, pole: Pole, flow: Flow) -> bool {
        let slot = &mut self.counters[kind.index()][pole.index()][flow.index()];
        assert!(*slot > 0, "contact counter underflow ({kind:?} {pole:?} {flow:?})");
        *slot -= 1;
        *slot == 0
    }
}
