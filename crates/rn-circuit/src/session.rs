//! Simulation session.
//!
//! `Session` owns one panel: the network, its circuits, relays, buttons and
//! the relay timer queue. Every public operation runs the engine to
//! completion, then settles relays whose coils changed, and reports what
//! happened. Nothing is global, so independent sessions can coexist.

use std::collections::{BTreeMap, BTreeSet};

use rn_core::{
    ButtonId, CableId, CableMode, CircuitId, CircuitKind, IdAlloc, NodeId, Pole, RelayId, RnError,
    Side, TaskId,
};
use rn_graph::{
    validate_topology, ButtonState, Contact, Event, Network, NodeKind, RelayState, StateChange,
};
use tracing::{debug, warn};

use crate::circuit::CircuitArena;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{CircuitError, CircuitResult};
use crate::relay::{position_for, Button, CoilTask, Relay};
use crate::report::PassReport;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Default)]
pub struct Session {
    net: Network,
    arena: CircuitArena,
    config: EngineConfig,
    relays: BTreeMap<RelayId, Relay>,
    relay_ids: IdAlloc,
    buttons: BTreeMap<ButtonId, Button>,
    button_ids: IdAlloc,
    scheduler: Scheduler<CoilTask>,
    /// Pending transition per coil contact.
    coil_tasks: BTreeMap<(NodeId, usize), TaskId>,
    /// Coil contacts last seen carrying a closed circuit.
    coils_powered: BTreeMap<(NodeId, usize), RelayId>,
}

fn wrong_kind(node: NodeId, found: &NodeKind, expected: &'static str) -> CircuitError {
    CircuitError::WrongKind {
        node,
        expected,
        found: found.name(),
    }
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn circuits(&self) -> &CircuitArena {
        &self.arena
    }

    pub fn relay(&self, id: RelayId) -> Option<&Relay> {
        self.relays.get(&id)
    }

    pub fn relays(&self) -> impl Iterator<Item = (RelayId, &Relay)> {
        self.relays.iter().map(|(id, r)| (*id, r))
    }

    pub fn button(&self, id: ButtonId) -> Option<&Button> {
        self.buttons.get(&id)
    }

    pub fn buttons(&self) -> impl Iterator<Item = (ButtonId, &Button)> {
        self.buttons.iter().map(|(id, b)| (*id, b))
    }

    /// Simulated time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// Relay transitions waiting for their delay.
    pub fn pending_transitions(&self) -> usize {
        self.scheduler.len()
    }

    /// Notifications recorded since the last call.
    pub fn events(&mut self) -> Vec<Event> {
        self.net.drain_events()
    }

    /// Check topology bindings and circuit tree invariants.
    pub fn verify(&self) -> Result<(), String> {
        validate_topology(&self.net).map_err(|e| e.to_string())?;
        self.arena.verify()
    }

    pub fn add_relay(&mut self, name: impl Into<String>, normally_up: bool) -> RelayId {
        let id = self.relay_ids.next_id();
        self.relays.insert(id, Relay::new(name, normally_up));
        id
    }

    pub fn add_button(&mut self, name: impl Into<String>) -> ButtonId {
        let id = self.button_ids.next_id();
        self.buttons.insert(id, Button::new(name));
        id
    }

    pub fn add_cable(&mut self, mode: CableMode) -> CableId {
        self.net.add_cable(mode)
    }

    /// Add a node. Relay and button contacts take the current state of the
    /// relay/button they follow.
    pub fn add_node(&mut self, name: impl Into<String>, mut kind: NodeKind) -> CircuitResult<NodeId> {
        match &mut kind {
            NodeKind::RelayContact(rc) => {
                if let Some(r) = rc.relay {
                    let relay = self.relays.get(&r).ok_or(CircuitError::UnknownRelay(r))?;
                    rc.set_position(position_for(relay.state()));
                }
            }
            NodeKind::RelayCoil(coil) => {
                if let Some(r) = coil.relay {
                    if !self.relays.contains_key(&r) {
                        return Err(CircuitError::UnknownRelay(r));
                    }
                }
            }
            NodeKind::ButtonContact(bc) => {
                if let Some(b) = bc.button {
                    let button = self.buttons.get(&b).ok_or(CircuitError::UnknownButton(b))?;
                    bc.apply(button.state);
                }
            }
            NodeKind::Junction(j) => {
                if let Some(c) = j.disabled_contact {
                    check_junction_contact(c)?;
                }
            }
            NodeKind::PowerSource(_) | NodeKind::Switch(_) => {}
        }
        let id = self.net.add_node(name, kind);
        let mut engine = self.engine();
        engine.restart_source(id);
        engine.finish();
        Ok(id)
    }

    /// Bind one pole of a node contact to a cable end.
    pub fn attach_cable(
        &mut self,
        node: NodeId,
        contact: usize,
        cable: CableId,
        side: Side,
        pole: Pole,
    ) -> CircuitResult<PassReport> {
        self.net.check_attach(node, contact, cable, side, pole)?;
        self.net.attach(node, contact, cable, side, pole)?;
        let mut ends = vec![node];
        if let Some(far) = self.net.cable(cable)?.get_node(!side) {
            if far.node != node {
                ends.push(far.node);
            }
        }

        let mut engine = self.engine();
        for n in &ends {
            engine.revalidate(*n);
        }
        for n in &ends {
            engine.restart_source(*n);
            engine.rescan_node(*n);
        }
        let report = engine.finish();
        self.settled(report)
    }

    /// Unbind one pole of a node contact, cutting circuits that crossed it.
    pub fn detach_cable(&mut self, node: NodeId, contact: usize, pole: Pole) -> CircuitResult<PassReport> {
        let binding = self.net.check_detach(node, contact, pole)?;
        let cable = self.net.cable(binding.cable)?;
        let crossing: Vec<CircuitId> = CircuitKind::ALL
            .iter()
            .flat_map(|k| cable.circuits(*k, pole).iter().copied())
            .collect();
        let mut ends = vec![node];
        if let Some(far) = cable.get_node(!binding.side) {
            if far.node != node {
                ends.push(far.node);
            }
        }
        self.net.detach(node, contact, pole)?;

        let mut engine = self.engine();
        let mut touched = engine.revalidate_circuits(crossing);
        for n in &ends {
            touched.extend(engine.revalidate(*n));
        }
        for n in &ends {
            engine.restart_source(*n);
            engine.rescan_node(*n);
        }
        for n in &ends {
            engine.default_reach_next_open(*n);
        }
        engine.regrow(&touched);
        let report = engine.finish();
        self.settled(report)
    }

    /// Detach both ends, then drop the cable.
    pub fn remove_cable(&mut self, cable: CableId) -> CircuitResult<PassReport> {
        let mut report = PassReport::default();
        let ends: Vec<_> = [Side::A, Side::B]
            .into_iter()
            .filter_map(|side| self.net.cable(cable).ok()?.get_node(side))
            .collect();
        self.net.cable(cable)?;
        for end in ends {
            for pole in Pole::BOTH {
                if self.pole_attached(end.node, end.contact, pole) {
                    report.merge(self.detach_cable(end.node, end.contact, pole)?);
                }
            }
        }
        self.net.remove_cable(cable)?;
        Ok(report)
    }

    /// Detach every contact, drop circuits rooted here, then drop the node.
    pub fn remove_node(&mut self, node: NodeId) -> CircuitResult<PassReport> {
        let mut report = PassReport::default();
        let contacts = self.net.node(node)?.contacts().len();
        for contact in 0..contacts {
            for pole in Pole::BOTH {
                if self.pole_attached(node, contact, pole) {
                    report.merge(self.detach_cable(node, contact, pole)?);
                }
            }
        }
        let mut engine = self.engine();
        engine.drop_source(node);
        report.merge(engine.finish());
        self.net.remove_node(node)?;
        self.settled(report)
    }

    fn pole_attached(&self, node: NodeId, contact: usize, pole: Pole) -> bool {
        self.net
            .node(node)
            .ok()
            .and_then(|n| n.contact(contact))
            .is_some_and(|c| c.binding().is_some() && c.contact_type(pole).is_connected())
    }

    /// Enable or disable a power source.
    pub fn set_source_enabled(&mut self, node: NodeId, enabled: bool) -> CircuitResult<PassReport> {
        let source = match &mut self.net.node_mut(node)?.kind {
            NodeKind::PowerSource(source) => source,
            other => return Err(wrong_kind(node, other, "power source")),
        };
        if source.enabled == enabled {
            return Ok(PassReport::default());
        }
        source.enabled = enabled;
        debug!(node = %node, enabled, "power source switched");

        let mut engine = self.engine();
        if enabled {
            engine.discover_from_source(node);
        } else {
            engine.drop_source(node);
        }
        let report = engine.finish();
        self.settled(report)
    }

    pub fn set_switch_on(&mut self, node: NodeId, on: bool) -> CircuitResult<PassReport> {
        let report = self.transition(node, "on/off switch", |kind| match kind {
            NodeKind::Switch(s) => {
                let was = s.on;
                s.on = on;
                Some(StateChange {
                    gained: on && !was,
                    lost: was && !on,
                })
            }
            _ => None,
        })?;
        self.settled(report)
    }

    /// Force a relay into `state`, as if its armature moved.
    pub fn set_relay_state(&mut self, relay: RelayId, state: RelayState) -> CircuitResult<PassReport> {
        let report = self.apply_relay_state(relay, state)?;
        self.settled(report)
    }

    pub fn set_button_state(&mut self, button: ButtonId, state: ButtonState) -> CircuitResult<PassReport> {
        let b = self
            .buttons
            .get_mut(&button)
            .ok_or(CircuitError::UnknownButton(button))?;
        if b.state == state {
            return Ok(PassReport::default());
        }
        b.state = state;
        let nodes = self.nodes_where(|kind| matches!(kind, NodeKind::ButtonContact(bc) if bc.button == Some(button)));
        let mut report = PassReport::default();
        for node in nodes {
            report.merge(self.transition(node, "button contact", |kind| match kind {
                NodeKind::ButtonContact(bc) => Some(bc.apply(state)),
                _ => None,
            })?);
        }
        self.settled(report)
    }

    /// Disable one junction contact (never contact 0). The contact must not
    /// be wired; open stubs through it are cut, and re-enabling grows them
    /// back.
    pub fn set_junction_disabled_contact(
        &mut self,
        node: NodeId,
        contact: Option<usize>,
    ) -> CircuitResult<PassReport> {
        if let Some(c) = contact {
            check_junction_contact(c)?;
        }
        let n = self.net.node(node)?;
        if !matches!(n.kind, NodeKind::Junction(_)) {
            return Err(wrong_kind(node, &n.kind, "junction"));
        }
        if let Some(c) = contact {
            if n.contact(c).and_then(Contact::binding).is_some() {
                return Err(rn_graph::GraphError::ContactBound { node, contact: c }.into());
            }
        }
        let report = self.transition(node, "junction", |kind| match kind {
            NodeKind::Junction(j) => {
                let was = j.disabled_contact;
                j.disabled_contact = contact;
                Some(StateChange {
                    gained: was.is_some() && was != contact,
                    lost: contact.is_some() && was != contact,
                })
            }
            _ => None,
        })?;
        self.settled(report)
    }

    /// Exchange the up/down contacts of a relay or button contact. Only an
    /// idle node can be rewired.
    pub fn set_deviator_swap(&mut self, node: NodeId, swap: bool) -> CircuitResult<()> {
        let n = self.net.node_mut(node)?;
        if n.has_any_circuits() {
            return Err(CircuitError::Busy(node));
        }
        match &mut n.kind {
            NodeKind::RelayContact(rc) => rc.deviator.set_swap(swap),
            NodeKind::ButtonContact(bc) => bc.deviator.set_swap(swap),
            other => return Err(wrong_kind(node, other, "relay or button contact")),
        }
        Ok(())
    }

    /// Mark an attached pole as passthrough (or back to plain connected)
    /// and bring the node's circuits in line with the new wiring.
    pub fn set_passthrough(
        &mut self,
        node: NodeId,
        contact: usize,
        pole: Pole,
        passthrough: bool,
    ) -> CircuitResult<PassReport> {
        let had_circuits = self.net.node(node)?.has_any_circuits();
        self.net.set_passthrough(node, contact, pole, passthrough)?;
        self.net.push_event(Event::ContactsChanged(node));

        let mut engine = self.engine();
        let touched = engine.revalidate(node);
        engine.rescan_node(node);
        if had_circuits {
            engine.default_reach_next_open(node);
        }
        engine.regrow(&touched);
        let report = engine.finish();
        self.settled(report)
    }

    /// Grow the circuits passing `node` into whatever its wiring allows
    /// and nothing covers yet. On a settled network this changes nothing.
    pub fn rescan_node(&mut self, node: NodeId) -> CircuitResult<PassReport> {
        self.net.node(node)?;
        let mut engine = self.engine();
        engine.rescan_node(node);
        let report = engine.finish();
        self.settled(report)
    }

    /// Drop every circuit and rediscover from all enabled sources.
    pub fn rescan_all(&mut self) -> CircuitResult<PassReport> {
        let mut engine = self.engine();
        engine.rescan_all();
        let report = engine.finish();
        self.settled(report)
    }

    /// Let `ms` of simulated time pass, firing relay transitions as they
    /// fall due.
    pub fn advance(&mut self, ms: u64) -> CircuitResult<PassReport> {
        let target = self.scheduler.now_ms().saturating_add(ms);
        let mut report = PassReport::default();
        while let Some(at) = self.scheduler.next_due().filter(|at| *at <= target) {
            self.scheduler.advance_to(at.max(self.scheduler.now_ms()));
            if !self.settle_into(&mut report)? {
                break;
            }
        }
        self.scheduler.advance_to(target);
        Ok(report)
    }

    fn engine(&mut self) -> Engine<'_> {
        Engine::new(&mut self.net, &mut self.arena, &self.config)
    }

    fn nodes_where(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.net.nodes().filter(|n| pred(&n.kind)).map(|n| n.id).collect()
    }

    /// Apply a wiring state change to `node` and bring its circuits in line:
    /// cut what no longer holds, grow into what opened up, and let
    /// neighbours feed contacts that went dark.
    fn transition(
        &mut self,
        node: NodeId,
        expected: &'static str,
        apply: impl FnOnce(&mut NodeKind) -> Option<StateChange>,
    ) -> CircuitResult<PassReport> {
        let n = self.net.node_mut(node)?;
        let had_circuits = n.has_any_circuits();
        let Some(change) = apply(&mut n.kind) else {
            return Err(wrong_kind(node, &n.kind, expected));
        };
        if change.is_noop() {
            return Ok(PassReport::default());
        }
        self.net.push_event(Event::ContactsChanged(node));

        let mut engine = self.engine();
        let touched = if change.lost { engine.revalidate(node) } else { Vec::new() };
        if change.gained {
            engine.rescan_node(node);
        }
        if had_circuits && change.lost {
            engine.default_reach_next_open(node);
        }
        engine.regrow(&touched);
        Ok(engine.finish())
    }

    fn apply_relay_state(&mut self, relay: RelayId, state: RelayState) -> CircuitResult<PassReport> {
        let r = self
            .relays
            .get_mut(&relay)
            .ok_or(CircuitError::UnknownRelay(relay))?;
        if !r.set_state(state) {
            return Ok(PassReport::default());
        }
        debug!(relay = %relay, ?state, "relay state changed");
        self.net.push_event(Event::RelayStateChanged { relay, state });

        let position = position_for(state);
        let nodes = self.nodes_where(|kind| matches!(kind, NodeKind::RelayContact(rc) if rc.relay == Some(relay)));
        let mut report = PassReport::default();
        for node in nodes {
            report.merge(self.transition(node, "relay contact", |kind| match kind {
                NodeKind::RelayContact(rc) => Some(rc.set_position(position)),
                _ => None,
            })?);
        }
        Ok(report)
    }

    fn settled(&mut self, mut report: PassReport) -> CircuitResult<PassReport> {
        self.settle_into(&mut report)?;
        Ok(report)
    }

    /// Apply due relay transitions until none is left. Returns false if the
    /// step bound was hit first.
    fn settle_into(&mut self, report: &mut PassReport) -> CircuitResult<bool> {
        for _ in 0..self.config.max_settle_steps {
            self.observe_coils();
            let Some((id, task)) = self.scheduler.pop_due() else {
                return Ok(true);
            };
            let key = (task.coil, task.contact);
            if self.coil_tasks.get(&key) == Some(&id) {
                self.coil_tasks.remove(&key);
            }
            let Some(relay) = self.relays.get_mut(&task.relay) else {
                continue;
            };
            let state = relay.coil(key, task.activate);
            report.merge(self.apply_relay_state(task.relay, state)?);
        }
        self.observe_coils();
        warn!(
            steps = self.config.max_settle_steps,
            "relay settle loop hit its step bound"
        );
        Ok(false)
    }

    /// Schedule a transition for every coil contact whose closed-circuit
    /// state changed since the last look.
    fn observe_coils(&mut self) {
        let mut live: BTreeMap<(NodeId, usize), (RelayId, bool, u64)> = BTreeMap::new();
        for node in self.net.nodes() {
            let NodeKind::RelayCoil(coil) = &node.kind else {
                continue;
            };
            let Some(relay) = coil.relay else {
                continue;
            };
            for contact in 0..node.contacts().len() {
                if !node.kind.is_contact_usable(contact) {
                    continue;
                }
                let powered = node.has_circuit(contact, CircuitKind::Closed);
                let delay = if powered {
                    coil.delay_up_ms
                } else {
                    coil.delay_down_ms
                };
                live.insert((node.id, contact), (relay, powered, delay));
            }
        }

        let mut changes = Vec::new();
        for (key, (relay, powered, delay)) in &live {
            if *powered != self.coils_powered.contains_key(key) {
                changes.push((*key, *relay, *powered, *delay));
            }
        }
        // Removed coils release at once.
        let gone: BTreeSet<(NodeId, usize)> = self
            .coils_powered
            .keys()
            .filter(|k| !live.contains_key(k))
            .copied()
            .collect();
        for key in gone {
            if let Some(relay) = self.coils_powered.get(&key).copied() {
                changes.push((key, relay, false, 0));
            }
        }

        for (key, relay, powered, delay) in changes {
            if powered {
                self.coils_powered.insert(key, relay);
            } else {
                self.coils_powered.remove(&key);
            }
            if let Some(task) = self.coil_tasks.remove(&key) {
                if self.scheduler.cancel(task).is_some() {
                    debug!(coil = %key.0, contact = key.1, "pending coil transition cancelled");
                    continue;
                }
            }
            let task = CoilTask {
                relay,
                coil: key.0,
                contact: key.1,
                activate: powered,
            };
            let id = self.scheduler.schedule(delay, task);
            self.coil_tasks.insert(key, id);
        }
    }
}

fn check_junction_contact(contact: usize) -> CircuitResult<()> {
    if contact == 0 {
        return Err(RnError::InvalidArg {
            what: "junction contact 0 cannot be disabled",
        }
        .into());
    }
    if contact >= 4 {
        return Err(RnError::IndexOob {
            what: "junction contact",
            index: contact,
            len: 4,
        }
        .into());
    }
    Ok(())
}
