//! The network: node and cable arenas plus the registration entry points
//! used by the circuit engine.

use rn_core::{CableId, CableMode, CircuitId, CircuitKind, ContactType, IdAlloc, NodeId, Pole, Side};
use tracing::debug;

use crate::cable::{Cable, CableEnd};
use crate::contact::{CableBinding, ContactPole, Flow};
use crate::error::{GraphError, GraphResult};
use crate::events::{Event, EventQueue};
use crate::kind::NodeKind;
use crate::node::{Node, Passage};

#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Option<Node>>,
    cables: Vec<Option<Cable>>,
    node_ids: IdAlloc,
    cable_ids: IdAlloc,
    events: EventQueue,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = self.node_ids.next_id();
        let node = Node::new(id, name, kind);
        debug!(node = %id, kind = node.kind.name(), name = %node.name, "node added");
        self.nodes.push(Some(node));
        id
    }

    /// Remove a node, unbinding its cables. The node must carry no circuits.
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<Node> {
        let node = self
            .nodes
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(GraphError::UnknownNode(id))?;
        assert!(node.is_idle(), "node {id} destroyed while carrying circuits");
        for binding in node.contacts.iter().filter_map(|c| c.binding) {
            if let Some(cable) = self.cables.get_mut(binding.cable.slot()).and_then(Option::as_mut) {
                cable.ends[binding.side.index()] = None;
            }
        }
        Ok(node)
    }

    pub fn add_cable(&mut self, mode: CableMode) -> CableId {
        let id = self.cable_ids.next_id();
        self.cables.push(Some(Cable::new(id, mode)));
        id
    }

    /// Remove a cable, unbinding both ends. The cable must carry no circuits.
    pub fn remove_cable(&mut self, id: CableId) -> GraphResult<Cable> {
        let cable = self
            .cables
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(GraphError::UnknownCable(id))?;
        assert!(cable.is_idle(), "cable {id} destroyed while carrying circuits");
        for end in cable.ends.iter().flatten() {
            if let Some(node) = self.nodes.get_mut(end.node.slot()).and_then(Option::as_mut) {
                let contact = &mut node.contacts[end.contact];
                contact.binding = None;
                contact.types = [ContactType::NotConnected; 2];
                self.events.push(Event::ContactsChanged(end.node));
            }
        }
        Ok(cable)
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownNode(id))
    }

    pub fn cable(&self, id: CableId) -> GraphResult<&Cable> {
        self.cables
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownCable(id))
    }

    pub fn cable_mut(&mut self, id: CableId) -> GraphResult<&mut Cable> {
        self.cables
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownCable(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn cables(&self) -> impl Iterator<Item = &Cable> {
        self.cables.iter().flatten()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }

    /// Node bound at the far end of the cable leaving through `binding`.
    pub fn far_end(&self, binding: CableBinding) -> Option<CableEnd> {
        self.cable(binding.cable)
            .ok()
            .and_then(|c| c.get_node(!binding.side))
    }

    /// Check that `attach` would succeed without breaking an invariant.
    pub fn check_attach(
        &self,
        node: NodeId,
        contact: usize,
        cable: CableId,
        side: Side,
        pole: Pole,
    ) -> GraphResult<()> {
        let n = self.node(node)?;
        let c = self.cable(cable)?;
        let slot = n.contacts.get(contact).ok_or(GraphError::ContactOob {
            node,
            contact,
            len: n.contacts.len(),
        })?;
        if !n.kind.is_contact_usable(contact) {
            return Err(GraphError::ContactDisabled { node, contact });
        }
        if let Some(end) = c.get_node(side) {
            if end != (CableEnd { node, contact }) {
                return Err(GraphError::EndBound { cable, side });
            }
        }
        if let Some(binding) = slot.binding {
            if binding != (CableBinding { cable, side }) {
                return Err(GraphError::ContactBound { node, contact });
            }
        }
        if slot.contact_type(pole).is_connected() {
            return Err(GraphError::PoleConnected {
                node,
                contact,
                pole,
            });
        }
        Ok(())
    }

    /// Bind one pole of `contact` to a cable end.
    ///
    /// Panics if the edit would corrupt the topology; callers validate with
    /// [`Network::check_attach`] first.
    pub fn attach(
        &mut self,
        node: NodeId,
        contact: usize,
        cable: CableId,
        side: Side,
        pole: Pole,
    ) -> GraphResult<()> {
        self.node(node)?;
        self.cable(cable)?;
        if let Err(err) = self.check_attach(node, contact, cable, side, pole) {
            panic!("invalid attach: {err}");
        }

        let n = self.node_mut(node)?;
        let slot = &mut n.contacts[contact];
        slot.binding = Some(CableBinding { cable, side });
        slot.types[pole.index()] = ContactType::Connected;
        self.cable_mut(cable)?.ends[side.index()] = Some(CableEnd { node, contact });
        self.events.push(Event::ContactsChanged(node));
        debug!(node = %node, contact, cable = %cable, ?side, %pole, "cable attached");
        Ok(())
    }

    /// Binding that `detach` would remove.
    pub fn check_detach(&self, node: NodeId, contact: usize, pole: Pole) -> GraphResult<CableBinding> {
        let n = self.node(node)?;
        let slot = n.contacts.get(contact).ok_or(GraphError::ContactOob {
            node,
            contact,
            len: n.contacts.len(),
        })?;
        match slot.binding {
            Some(binding) if slot.contact_type(pole).is_connected() => Ok(binding),
            Some(binding) => Err(GraphError::PoleNotAttached {
                node,
                contact,
                pole,
                cable: binding.cable,
            }),
            None => Err(GraphError::Inconsistent {
                what: format!("contact {contact} of node {node} has no cable"),
            }),
        }
    }

    /// Unbind one pole; the cable end is released when no pole remains.
    pub fn detach(&mut self, node: NodeId, contact: usize, pole: Pole) -> GraphResult<()> {
        let binding = match self.check_detach(node, contact, pole) {
            Ok(binding) => binding,
            Err(GraphError::UnknownNode(id)) => return Err(GraphError::UnknownNode(id)),
            Err(GraphError::ContactOob { node, contact, len }) => {
                return Err(GraphError::ContactOob { node, contact, len });
            }
            Err(err) => panic!("invalid detach: {err}"),
        };

        let n = self.node_mut(node)?;
        let slot = &mut n.contacts[contact];
        slot.types[pole.index()] = ContactType::NotConnected;
        let release = !slot.contact_type(!pole).is_connected();
        if release {
            slot.binding = None;
        }
        if release {
            let cable = self.cable_mut(binding.cable)?;
            assert_eq!(
                cable.ends[binding.side.index()],
                Some(CableEnd { node, contact }),
                "cable end does not match contact binding"
            );
            cable.ends[binding.side.index()] = None;
        }
        self.events.push(Event::ContactsChanged(node));
        debug!(node = %node, contact, cable = %binding.cable, %pole, release, "cable detached");
        Ok(())
    }

    /// Mark a connected pole as passthrough (or back to plain connected).
    pub fn set_passthrough(
        &mut self,
        node: NodeId,
        contact: usize,
        pole: Pole,
        passthrough: bool,
    ) -> GraphResult<()> {
        self.check_detach(node, contact, pole)?;
        let slot = &mut self.node_mut(node)?.contacts[contact];
        slot.types[pole.index()] = if passthrough {
            ContactType::Passthrough
        } else {
            ContactType::Connected
        };
        Ok(())
    }

    pub fn register_passages(
        &mut self,
        node: NodeId,
        circuit: CircuitId,
        kind: CircuitKind,
        passages: &[Passage],
    ) {
        if self.expect_node(node).register(circuit, kind, passages) {
            self.events.push(Event::ContactsChanged(node));
        }
    }

    pub fn unregister_passages(
        &mut self,
        node: NodeId,
        circuit: CircuitId,
        kind: CircuitKind,
        passages: &[Passage],
    ) {
        if self.expect_node(node).unregister(circuit, kind, passages) {
            self.events.push(Event::ContactsChanged(node));
        }
    }

    /// Count one more flow without touching the circuit list. Used when a
    /// registered half passage gains its exit.
    pub fn add_flow(&mut self, node: NodeId, kind: CircuitKind, at: ContactPole, flow: Flow) {
        if self.expect_node(node).add_flow(kind, at, flow) {
            self.events.push(Event::ContactsChanged(node));
        }
    }

    pub fn remove_flow(&mut self, node: NodeId, kind: CircuitKind, at: ContactPole, flow: Flow) {
        if self.expect_node(node).remove_flow(kind, at, flow) {
            self.events.push(Event::ContactsChanged(node));
        }
    }

    pub fn register_cable(&mut self, cable: CableId, circuit: CircuitId, kind: CircuitKind, pole: Pole) {
        let c = self.expect_cable(cable);
        let before = c.powered();
        c.add_circuit(circuit, kind, pole);
        let after = c.powered();
        if before != after {
            self.events.push(Event::PowerChanged { cable, power: after });
        }
    }

    pub fn unregister_cable(&mut self, cable: CableId, circuit: CircuitId, kind: CircuitKind, pole: Pole) {
        let c = self.expect_cable(cable);
        let before = c.powered();
        c.remove_circuit(circuit, kind, pole);
        let after = c.powered();
        if before != after {
            self.events.push(Event::PowerChanged { cable, power: after });
        }
    }

    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    /// True when no node or cable carries a registration.
    pub fn is_idle(&self) -> bool {
        self.nodes().all(Node::is_idle) && self.cables().all(Cable::is_idle)
    }

    fn expect_node(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("circuit references missing node {id}"))
    }

    fn expect_cable(&mut self, id: CableId) -> &mut Cable {
        self.cables
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("circuit references missing cable {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{OnOffSwitch, PowerSource};

    fn pair() -> (Network, NodeId, NodeId, CableId) {
        let mut net = Network::new();
        let a = net.add_node("A", NodeKind::PowerSource(PowerSource::default()));
        let b = net.add_node("B", NodeKind::Switch(OnOffSwitch::default()));
        let k = net.add_cable(CableMode::Bifilar1);
        (net, a, b, k)
    }

    #[test]
    fn attach_binds_both_sides() {
        let (mut net, a, b, k) = pair();
        net.attach(a, 0, k, Side::A, Pole::First).unwrap();
        net.attach(a, 0, k, Side::A, Pole::Second).unwrap();
        net.attach(b, 0, k, Side::B, Pole::First).unwrap();

        let cable = net.cable(k).unwrap();
        assert_eq!(cable.get_node(Side::A), Some(CableEnd { node: a, contact: 0 }));
        assert_eq!(cable.get_node(Side::B), Some(CableEnd { node: b, contact: 0 }));
        let binding = net.node(a).unwrap().contacts()[0].binding().unwrap();
        assert_eq!(net.far_end(binding), Some(CableEnd { node: b, contact: 0 }));
    }

    #[test]
    fn second_attach_on_same_end_is_rejected() {
        let (mut net, a, b, k) = pair();
        net.attach(a, 0, k, Side::A, Pole::First).unwrap();
        let err = net.check_attach(b, 1, k, Side::A, Pole::First).unwrap_err();
        assert_eq!(err, GraphError::EndBound { cable: k, side: Side::A });
        let err = net.check_attach(a, 0, k, Side::A, Pole::First).unwrap_err();
        assert!(matches!(err, GraphError::PoleConnected { .. }));
    }

    #[test]
    #[should_panic(expected = "invalid attach")]
    fn forced_double_attach_panics() {
        let (mut net, a, _b, k) = pair();
        net.attach(a, 0, k, Side::A, Pole::First).unwrap();
        let _ = net.attach(a, 0, k, Side::A, Pole::First);
    }

    #[test]
    fn detach_releases_end_after_last_pole() {
        let (mut net, a, _b, k) = pair();
        net.attach(a, 0, k, Side::A, Pole::First).unwrap();
        net.attach(a, 0, k, Side::A, Pole::Second).unwrap();
        net.detach(a, 0, Pole::First).unwrap();
        assert!(net.cable(k).unwrap().get_node(Side::A).is_some());
        net.detach(a, 0, Pole::Second).unwrap();
        assert!(net.cable(k).unwrap().get_node(Side::A).is_none());
        assert!(net.node(a).unwrap().contacts()[0].binding().is_none());
    }

    #[test]
    fn cable_power_change_is_reported_once() {
        let (mut net, _a, _b, k) = pair();
        let c1 = CircuitId::from_index(0);
        let c2 = CircuitId::from_index(1);
        net.drain_events();
        net.register_cable(k, c1, CircuitKind::Closed, Pole::First);
        net.register_cable(k, c2, CircuitKind::Closed, Pole::First);
        let events = net.drain_events();
        assert_eq!(events.len(), 1);
        net.unregister_cable(k, c1, CircuitKind::Closed, Pole::First);
        assert!(net.drain_events().is_empty());
        net.unregister_cable(k, c2, CircuitKind::Closed, Pole::First);
        assert_eq!(net.drain_events().len(), 1);
        assert!(net.is_idle());
    }

    #[test]
    fn unknown_ids_are_errors() {
        let (net, ..) = pair();
        let missing = NodeId::from_index(99);
        assert_eq!(net.node(missing).unwrap_err(), GraphError::UnknownNode(missing));
    }
}
