//! Integration tests for rn-graph.

use proptest::prelude::*;
use rn_core::{AnyCircuit, CableMode, CablePower, CablePowerPole, CircuitId, CircuitKind, Pole, Side};
use rn_graph::{
    validate_topology, ContactPole, Event, Junction, Network, NodeKind, OnOffSwitch, Passage,
    PowerSource,
};

fn cp(contact: usize, pole: Pole) -> ContactPole {
    ContactPole::new(contact, pole)
}

#[test]
fn wire_source_to_junction() {
    // Source -> [K1] -> Junction
    let mut net = Network::new();
    let src = net.add_node("B1", NodeKind::PowerSource(PowerSource { enabled: false }));
    let j = net.add_node("J1", NodeKind::Junction(Junction::default()));
    let k = net.add_cable(CableMode::BifilarBoth);
    for pole in Pole::BOTH {
        net.attach(src, 0, k, Side::A, pole).unwrap();
        net.attach(j, 0, k, Side::B, pole).unwrap();
    }
    validate_topology(&net).unwrap();

    let binding = net.node(src).unwrap().contacts()[0].binding().unwrap();
    let end = net.far_end(binding).unwrap();
    assert_eq!(end.node, j);
    assert_eq!(end.contact, 0);

    let out = net
        .node(j)
        .unwrap()
        .active_connections(cp(0, Pole::Second), false);
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|c| c.pole == Pole::Second));
}

#[test]
fn registration_round_trip_leaves_network_idle() {
    let mut net = Network::new();
    let s = net.add_node("S1", NodeKind::Switch(OnOffSwitch { on: true }));
    let k = net.add_cable(CableMode::Unifilar);
    net.attach(s, 1, k, Side::A, Pole::First).unwrap();
    net.drain_events();

    let circuit = CircuitId::from_index(0);
    let passage = Passage {
        from: Some(cp(0, Pole::First)),
        to: Some(cp(1, Pole::First)),
    };
    net.register_passages(s, circuit, CircuitKind::Closed, &[passage]);
    net.register_cable(k, circuit, CircuitKind::Closed, Pole::First);

    let node = net.node(s).unwrap();
    assert_eq!(node.has_any_circuit(1), AnyCircuit::Closed);
    assert!(node.has_exit_on_pole(1, Pole::First, CircuitKind::Closed));
    assert_eq!(
        net.cable(k).unwrap().powered(),
        CablePower::Closed(CablePowerPole::First)
    );

    let events = net.drain_events();
    assert!(events.contains(&Event::ContactsChanged(s)));
    assert!(events.iter().any(|e| matches!(e, Event::PowerChanged { cable, .. } if *cable == k)));

    net.unregister_passages(s, circuit, CircuitKind::Closed, &[passage]);
    net.unregister_cable(k, circuit, CircuitKind::Closed, Pole::First);
    assert!(net.is_idle());
}

#[test]
fn removing_cable_unbinds_contacts() {
    let mut net = Network::new();
    let a = net.add_node("A", NodeKind::Switch(OnOffSwitch::default()));
    let b = net.add_node("B", NodeKind::Switch(OnOffSwitch::default()));
    let k = net.add_cable(CableMode::default());
    net.attach(a, 1, k, Side::A, Pole::First).unwrap();
    net.attach(b, 0, k, Side::B, Pole::First).unwrap();

    net.remove_cable(k).unwrap();
    assert!(net.node(a).unwrap().contacts()[1].binding().is_none());
    assert!(net.node(b).unwrap().contacts()[0].binding().is_none());
    validate_topology(&net).unwrap();
}

proptest! {
    #[test]
    fn registration_counters_balance(
        regs in prop::collection::vec((0..4usize, 1..4usize, any::<bool>(), any::<bool>()), 1..16)
    ) {
        let mut net = Network::new();
        let j = net.add_node("J1", NodeKind::Junction(Junction::default()));
        let mut done = Vec::new();
        for (i, (from, step, second, closed)) in regs.into_iter().enumerate() {
            let pole = if second { Pole::Second } else { Pole::First };
            let kind = if closed { CircuitKind::Closed } else { CircuitKind::Open };
            let passage = Passage {
                from: Some(cp(from, pole)),
                to: Some(cp((from + step) % 4, pole)),
            };
            let circuit = CircuitId::from_index(i as u32);
            net.register_passages(j, circuit, kind, &[passage]);
            done.push((circuit, kind, passage));
        }
        prop_assert!(net.node(j).unwrap().has_any_circuits());
        for (circuit, kind, passage) in done.into_iter().rev() {
            net.unregister_passages(j, circuit, kind, &[passage]);
        }
        prop_assert!(net.node(j).unwrap().is_idle());
        prop_assert!(net.is_idle());
    }
}
