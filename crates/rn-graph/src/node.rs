//! Nodes: contacts, wiring and circuit registrations.

use std::collections::BTreeMap;

use rn_core::{AnyCircuit, CircuitId, CircuitKind, NodeId, Pole};

use crate::contact::{Contact, ContactPole, Flow};
use crate::kind::NodeKind;

/// Node-local view of one circuit passage.
///
/// `from` is missing where a circuit starts inside the node (power source,
/// branch continuation); `to` is missing where it ends inside the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Passage {
    pub from: Option<ContactPole>,
    pub to: Option<ContactPole>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub(crate) contacts: Vec<Contact>,
    /// Registered circuits with their passage count, per kind.
    circuits: [BTreeMap<CircuitId, u32>; 2],
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        let contacts = kind.contact_layout();
        Self {
            id,
            name: name.into(),
            kind,
            contacts,
            circuits: [BTreeMap::new(), BTreeMap::new()],
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, contact: usize) -> Option<&Contact> {
        self.contacts.get(contact)
    }

    pub fn is_source(&self) -> bool {
        self.kind.is_source()
    }

    pub fn active_connections(&self, incoming: ContactPole, invert: bool) -> Vec<ContactPole> {
        self.kind.active_connections(&self.contacts, incoming, invert)
    }

    pub fn has_circuit(&self, contact: usize, kind: CircuitKind) -> bool {
        self.contacts
            .get(contact)
            .is_some_and(|c| Pole::BOTH.iter().any(|p| c.has_circuit(kind, *p)))
    }

    pub fn has_circuit_on_pole(&self, contact: usize, pole: Pole, kind: CircuitKind) -> bool {
        self.contacts
            .get(contact)
            .is_some_and(|c| c.has_circuit(kind, pole))
    }

    pub fn has_entrance_on_pole(&self, contact: usize, pole: Pole, kind: CircuitKind) -> bool {
        self.contacts
            .get(contact)
            .is_some_and(|c| c.count(kind, pole, Flow::Entrance) > 0)
    }

    pub fn has_exit_on_pole(&self, contact: usize, pole: Pole, kind: CircuitKind) -> bool {
        self.contacts
            .get(contact)
            .is_some_and(|c| c.count(kind, pole, Flow::Exit) > 0)
    }

    pub fn has_any_circuit(&self, contact: usize) -> AnyCircuit {
        self.contacts.get(contact).map_or(AnyCircuit::None, Contact::any)
    }

    pub fn has_any_circuit_on_pole(&self, contact: usize, pole: Pole) -> AnyCircuit {
        self.contacts
            .get(contact)
            .map_or(AnyCircuit::None, |c| c.any_on_pole(pole))
    }

    pub fn has_any_entrance_on_pole(&self, contact: usize, pole: Pole) -> AnyCircuit {
        self.contacts
            .get(contact)
            .map_or(AnyCircuit::None, |c| c.any_flow_on_pole(pole, Flow::Entrance))
    }

    pub fn has_any_exit_on_pole(&self, contact: usize, pole: Pole) -> AnyCircuit {
        self.contacts
            .get(contact)
            .map_or(AnyCircuit::None, |c| c.any_flow_on_pole(pole, Flow::Exit))
    }

    pub fn has_circuits(&self, kind: CircuitKind) -> bool {
        !self.circuits[kind.index()].is_empty()
    }

    pub fn has_any_circuits(&self) -> bool {
        CircuitKind::ALL.iter().any(|k| self.has_circuits(*k))
    }

    /// Circuits of `kind` registered here, in id order.
    pub fn circuits(&self, kind: CircuitKind) -> impl Iterator<Item = CircuitId> + '_ {
        self.circuits[kind.index()].keys().copied()
    }

    /// Every registered circuit, closed first.
    pub fn all_circuits(&self) -> Vec<CircuitId> {
        self.circuits(CircuitKind::Closed)
            .chain(self.circuits(CircuitKind::Open))
            .collect()
    }

    /// True when no contact carries any circuit.
    pub fn is_idle(&self) -> bool {
        !self.has_any_circuits() && self.contacts.iter().all(Contact::is_idle)
    }

    /// Register `passages` of `circuit`. Returns true if any counter went
    /// from 0 to 1.
    pub(crate) fn register(
        &mut self,
        circuit: CircuitId,
        kind: CircuitKind,
        passages: &[Passage],
    ) -> bool {
        if passages.is_empty() {
            return false;
        }
        *self.circuits[kind.index()].entry(circuit).or_insert(0) += passages.len() as u32;
        let mut changed = false;
        for p in passages {
            if let Some(from) = p.from {
                changed |= self.add_flow(kind, from, Flow::Entrance);
            }
            if let Some(to) = p.to {
                changed |= self.add_flow(kind, to, Flow::Exit);
            }
        }
        changed
    }

    pub(crate) fn unregister(
        &mut self,
        circuit: CircuitId,
        kind: CircuitKind,
        passages: &[Passage],
    ) -> bool {
        let list = &mut self.circuits[kind.index()];
        let count = list
            .get_mut(&circuit)
            .unwrap_or_else(|| panic!("circuit {circuit} is not registered on node {}", self.id));
        assert!(
            *count >= passages.len() as u32,
            "circuit {circuit} unregistered more passages than it registered"
        );
        *count -= passages.len() as u32;
        if *count == 0 {
            list.remove(&circuit);
        }
        let mut changed = false;
        for p in passages {
            if let Some(from) = p.from {
                changed |= self.remove_flow(kind, from, Flow::Entrance);
            }
            if let Some(to) = p.to {
                changed |= self.remove_flow(kind, to, Flow::Exit);
            }
        }
        changed
    }

    pub(crate) fn add_flow(&mut self, kind: CircuitKind, at: ContactPole, flow: Flow) -> bool {
        self.contact_mut(at.contact).increment(kind, at.pole, flow)
    }

    pub(crate) fn remove_flow(&mut self, kind: CircuitKind, at: ContactPole, flow: Flow) -> bool {
        self.contact_mut(at.contact).decrement(kind, at.pole, flow)
    }

    fn contact_mut(&mut self, contact: usize) -> &mut Contact {
        let len = self.contacts.len();
        self.contacts
            .get_mut(contact)
            .unwrap_or_else(|| panic!("contact {contact} out of range ({len})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::OnOffSwitch;

    fn cp(contact: usize, pole: Pole) -> ContactPole {
        ContactPole::new(contact, pole)
    }

    #[test]
    fn register_counts_entrance_and_exit() {
        let mut node = Node::new(
            NodeId::from_index(0),
            "S1",
            NodeKind::Switch(OnOffSwitch { on: true }),
        );
        let circuit = CircuitId::from_index(7);
        let p = Passage {
            from: Some(cp(0, Pole::First)),
            to: Some(cp(1, Pole::First)),
        };
        assert!(node.register(circuit, CircuitKind::Open, &[p]));
        assert_eq!(node.has_any_entrance_on_pole(0, Pole::First), AnyCircuit::Open);
        assert_eq!(node.has_any_exit_on_pole(1, Pole::First), AnyCircuit::Open);
        assert_eq!(node.has_any_exit_on_pole(0, Pole::First), AnyCircuit::None);
        assert_eq!(node.circuits(CircuitKind::Open).collect::<Vec<_>>(), vec![circuit]);

        assert!(node.unregister(circuit, CircuitKind::Open, &[p]));
        assert!(node.is_idle());
    }

    #[test]
    fn half_passage_only_touches_one_side() {
        let mut node = Node::new(
            NodeId::from_index(0),
            "S1",
            NodeKind::Switch(OnOffSwitch { on: false }),
        );
        let circuit = CircuitId::from_index(1);
        let half = Passage {
            from: Some(cp(1, Pole::Second)),
            to: None,
        };
        node.register(circuit, CircuitKind::Closed, &[half]);
        assert!(node.has_circuit(1, CircuitKind::Closed));
        assert!(!node.has_circuit(0, CircuitKind::Closed));
        assert_eq!(node.has_any_circuit(1), AnyCircuit::Closed);
        node.unregister(circuit, CircuitKind::Closed, &[half]);
        assert!(node.is_idle());
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn removing_unknown_circuit_is_fatal() {
        let mut node = Node::new(
            NodeId::from_index(0),
            "S1",
            NodeKind::Switch(OnOffSwitch::default()),
        );
        node.unregister(CircuitId::from_index(3), CircuitKind::Open, &[]);
    }
}
