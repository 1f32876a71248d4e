//! Discovery walks.
//!
//! A walk follows current from a node passage through the wiring tables
//! and cables, collecting items in `pending` until it can seal them: at a
//! dead end (open leaf), at a branch point (open parent, one child walk per
//! continuation) or back at its own source on the return pole (closed leaf).
//! A walk that returns `Err` has registered nothing.

use rn_core::{AnyCircuit, CableId, CircuitId, CircuitKind, NodeId, Pole, Side};
use rn_graph::{CableBinding, CableEnd, ContactPole, Network, Node, NodeKind};
use tracing::trace;

use crate::circuit::CircuitArena;
use crate::config::EngineConfig;
use crate::item::{contains_node, CablePassage, Item, NodePassage};
use crate::report::{Abandon, PassReport};

/// Contact and pole current leaves a power source through.
pub const SOURCE_EXIT: ContactPole = ContactPole {
    contact: 0,
    pole: Pole::First,
};

/// Contact and pole a closed circuit returns into its source through.
pub const SOURCE_RETURN: ContactPole = ContactPole {
    contact: 0,
    pole: Pole::Second,
};

/// What a sealed walk becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Anchor {
    Root,
    Child(CircuitId),
    /// Grow this leaf in place; `pending` starts with its last passage.
    Extend(CircuitId),
}

#[derive(Debug, Clone)]
pub(crate) struct Walk {
    pub(crate) anchor: Anchor,
    pub(crate) source: NodeId,
    /// Path already registered above this walk (cycle checks only).
    pub(crate) upstream: Vec<Item>,
    pub(crate) pending: Vec<Item>,
}

impl Walk {
    fn visits(&self, node: NodeId, at: ContactPole) -> bool {
        contains_node(&self.upstream, node, at) || contains_node(&self.pending, node, at)
    }
}

/// One viable way out of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Leave through a contact whose cable leads nowhere.
    Dangling(ContactPole),
    /// Leave through `at`, cross `cable` from `side`, enter `far` at `far_at`.
    Hop {
        at: ContactPole,
        cable: CableId,
        side: Side,
        far: NodeId,
        far_at: ContactPole,
    },
}

impl Step {
    pub(crate) fn at(self) -> ContactPole {
        match self {
            Step::Dangling(at) | Step::Hop { at, .. } => at,
        }
    }
}

/// Cable binding and bound far end reached by leaving `node` through `at`,
/// if both poles on the way are attached.
pub(crate) fn hop_target(net: &Network, node: NodeId, at: ContactPole) -> Option<(CableBinding, CableEnd)> {
    let contact = net.node(node).ok()?.contact(at.contact)?;
    if !contact.contact_type(at.pole).is_connected() {
        return None;
    }
    let binding = contact.binding()?;
    let end = net.far_end(binding)?;
    let far = net.node(end.node).ok()?.contact(end.contact)?;
    far.contact_type(at.pole).is_connected().then_some((binding, end))
}

pub(crate) fn set_last_to(items: &mut [Item], to: Option<ContactPole>) {
    if let Some(last) = items.last_mut().and_then(Item::as_node_mut) {
        last.to = to;
    }
}

/// Borrowed engine state for one public operation.
pub(crate) struct Engine<'a> {
    pub(crate) net: &'a mut Network,
    pub(crate) arena: &'a mut CircuitArena,
    pub(crate) config: &'a EngineConfig,
    pub(crate) report: PassReport,
    /// Closed leaves sealed during this operation.
    closed: Vec<CircuitId>,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(net: &'a mut Network, arena: &'a mut CircuitArena, config: &'a EngineConfig) -> Self {
        Self {
            net,
            arena,
            config,
            report: PassReport::default(),
            closed: Vec::new(),
        }
    }

    /// Drop open circuits that now push against a new closed circuit and
    /// hand back the report.
    pub(crate) fn finish(mut self) -> PassReport {
        let closed = std::mem::take(&mut self.closed);
        for id in closed {
            self.drop_reverse_voltage(id);
        }
        self.report
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.net
            .node(id)
            .unwrap_or_else(|err| panic!("circuit walk reached a missing node: {err}"))
    }

    /// Start discovery at an enabled source.
    pub(crate) fn discover_from_source(&mut self, source: NodeId) {
        let mut walk = Walk {
            anchor: Anchor::Root,
            source,
            upstream: Vec::new(),
            pending: vec![Item::Node(NodePassage {
                node: source,
                from: None,
                to: None,
            })],
        };
        let steps = self.classify(&walk, source, None, vec![SOURCE_EXIT]);
        let Some(step) = steps.first().copied() else {
            return;
        };
        if let Err(why) = self.follow(&mut walk, step, 0) {
            trace!(source = %source, ?why, "discovery abandoned");
            self.report.abandon(why);
        }
    }

    /// Rediscover from `node` if it is an enabled source left without
    /// circuits.
    pub(crate) fn restart_source(&mut self, node: NodeId) {
        let enabled = matches!(&self.node(node).kind, NodeKind::PowerSource(s) if s.enabled);
        if enabled && self.arena.roots_of(node).is_empty() {
            self.discover_from_source(node);
        }
    }

    /// Delete every circuit and rediscover from each enabled source in id
    /// order.
    pub(crate) fn rescan_all(&mut self) {
        self.report.deleted += self.arena.clear(self.net);
        let sources: Vec<NodeId> = self
            .net
            .nodes()
            .filter(|n| matches!(&n.kind, NodeKind::PowerSource(s) if s.enabled))
            .map(|n| n.id)
            .collect();
        for source in sources {
            self.discover_from_source(source);
        }
    }

    /// Keep the continuations of `exits` that may be taken from `node`,
    /// recording why the others were dropped.
    pub(crate) fn classify(
        &mut self,
        walk: &Walk,
        node: NodeId,
        incoming: Option<ContactPole>,
        exits: Vec<ContactPole>,
    ) -> Vec<Step> {
        let mut steps = Vec::with_capacity(exits.len());
        for at in exits {
            match self.step_for(walk, node, incoming, at) {
                Ok(step) => steps.push(step),
                Err(why) => {
                    trace!(node = %node, contact = at.contact, pole = %at.pole, ?why, "continuation dropped");
                    self.report.abandon(why);
                }
            }
        }
        steps
    }

    fn step_for(
        &self,
        walk: &Walk,
        node: NodeId,
        incoming: Option<ContactPole>,
        at: ContactPole,
    ) -> Result<Step, Abandon> {
        if walk.visits(node, at) {
            return Err(Abandon::Cycle);
        }
        let Some((binding, end)) = hop_target(self.net, node, at) else {
            if self.node(node).has_any_circuit_on_pole(at.contact, at.pole).is_none() {
                return Ok(Step::Dangling(at));
            }
            return Err(Abandon::AlreadyPowered);
        };
        let far_at = ContactPole::new(end.contact, at.pole);
        if end.node == node && incoming.is_some_and(|i| i.contact == end.contact) {
            return Err(Abandon::SelfLoop);
        }
        if walk.visits(end.node, far_at) {
            return Err(Abandon::Cycle);
        }
        let far = self.node(end.node);
        if far.is_source() {
            if end.node != walk.source {
                return Err(Abandon::ForeignSource);
            }
            if far_at != SOURCE_RETURN {
                return Err(Abandon::SamePoleReturn);
            }
        } else if far.has_any_exit_on_pole(end.contact, at.pole) == AnyCircuit::Closed {
            return Err(Abandon::Backfeed);
        }
        Ok(Step::Hop {
            at,
            cable: binding.cable,
            side: binding.side,
            far: end.node,
            far_at,
        })
    }

    /// Take `step` out of the node passage that ends `walk.pending`.
    fn follow(&mut self, walk: &mut Walk, step: Step, depth: usize) -> Result<(), Abandon> {
        set_last_to(&mut walk.pending, Some(step.at()));
        match step {
            Step::Dangling(_) => self.seal(walk, CircuitKind::Open).map(|_| ()),
            Step::Hop {
                at,
                cable,
                side,
                far,
                far_at,
            } => {
                walk.pending.push(Item::Cable(CablePassage {
                    cable,
                    side,
                    pole: at.pole,
                }));
                self.pass_node(walk, far, far_at, depth + 1)
            }
        }
    }

    fn pass_node(&mut self, walk: &mut Walk, node: NodeId, incoming: ContactPole, depth: usize) -> Result<(), Abandon> {
        if depth > self.config.max_depth {
            return Err(Abandon::DepthLimit);
        }
        walk.pending.push(Item::Node(NodePassage {
            node,
            from: Some(incoming),
            to: None,
        }));
        if node == walk.source {
            // Only the return pole is classified as a way back in.
            return self.seal(walk, CircuitKind::Closed).map(|_| ());
        }
        let exits = self.node(node).active_connections(incoming, false);
        let steps = self.classify(walk, node, Some(incoming), exits);
        self.continue_from(walk, node, steps, depth)
    }

    /// Continue a walk whose pending items end with a half passage at `node`.
    pub(crate) fn continue_from(
        &mut self,
        walk: &mut Walk,
        node: NodeId,
        steps: Vec<Step>,
        depth: usize,
    ) -> Result<(), Abandon> {
        match steps.as_slice() {
            [] => self.seal(walk, CircuitKind::Open).map(|_| ()),
            [step] => {
                let mark = walk.pending.len();
                match self.follow(walk, *step, depth) {
                    Ok(()) => Ok(()),
                    Err(why) => {
                        walk.pending.truncate(mark);
                        set_last_to(&mut walk.pending, None);
                        if why == Abandon::Duplicate {
                            return Err(why);
                        }
                        trace!(node = %node, ?why, "walk ends early");
                        self.report.abandon(why);
                        self.seal(walk, CircuitKind::Open).map(|_| ())
                    }
                }
            }
            _ => {
                let parent = self.seal(walk, CircuitKind::Open)?;
                for step in &steps {
                    self.branch(walk.source, parent, node, *step, &steps, depth);
                }
                Ok(())
            }
        }
    }

    /// Spawn a child of `parent` (which ends at `node`) along `step`.
    pub(crate) fn branch(
        &mut self,
        source: NodeId,
        parent: CircuitId,
        node: NodeId,
        step: Step,
        siblings: &[Step],
        depth: usize,
    ) {
        let mut upstream = self.arena.full_path(parent);
        // Siblings' exits are taken even before their walks run.
        upstream.extend(siblings.iter().map(|s| {
            Item::Node(NodePassage {
                node,
                from: None,
                to: Some(s.at()),
            })
        }));
        let mut walk = Walk {
            anchor: Anchor::Child(parent),
            source,
            upstream,
            pending: vec![Item::Node(NodePassage {
                node,
                from: None,
                to: None,
            })],
        };
        if let Err(why) = self.follow(&mut walk, step, depth) {
            trace!(parent = %parent, node = %node, ?why, "branch abandoned");
            self.report.abandon(why);
        }
    }

    /// Register `walk.pending` according to the walk's anchor.
    fn seal(&mut self, walk: &mut Walk, kind: CircuitKind) -> Result<CircuitId, Abandon> {
        let id = match walk.anchor {
            Anchor::Extend(id) => {
                if matches!(walk.pending.as_slice(), [Item::Node(p)] if p.is_half()) {
                    walk.pending.clear();
                    return Ok(id);
                }
                self.arena.extend(self.net, id, &walk.pending)?;
                self.report.extended += 1;
                if kind == CircuitKind::Closed {
                    self.arena.mark_closed(self.net, id);
                }
                id
            }
            Anchor::Root | Anchor::Child(_) => {
                let parent = match walk.anchor {
                    Anchor::Child(p) => Some(p),
                    _ => None,
                };
                let id = self
                    .arena
                    .spawn(self.net, parent, walk.source, kind, walk.pending.clone())?;
                self.report.created += 1;
                id
            }
        };
        if kind == CircuitKind::Closed {
            self.report.closed += 1;
            self.closed.push(id);
        }
        walk.pending.clear();
        Ok(id)
    }

    /// Walk for growing leaf `id` from its trailing half passage.
    pub(crate) fn extend_walk(&self, id: CircuitId) -> Option<Walk> {
        let c = self.arena.get(id)?;
        let last = *c.last_passage().filter(|p| p.is_half())?;
        let mut upstream = self.arena.full_path(id);
        upstream.pop();
        Some(Walk {
            anchor: Anchor::Extend(id),
            source: c.source(),
            upstream,
            pending: vec![Item::Node(last)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rn_core::CableMode;
    use rn_graph::{Junction, OnOffSwitch, PowerSource};

    fn wire(net: &mut Network, a: NodeId, ac: usize, b: NodeId, bc: usize) {
        let k = net.add_cable(CableMode::BifilarBoth);
        for pole in Pole::BOTH {
            net.attach(a, ac, k, Side::A, pole).unwrap();
            net.attach(b, bc, k, Side::B, pole).unwrap();
        }
    }

    #[test]
    fn dangling_source_gets_open_root() {
        let mut net = Network::new();
        let s = net.add_node("B", NodeKind::PowerSource(PowerSource { enabled: true }));
        let mut arena = CircuitArena::new();
        let config = EngineConfig::default();
        let mut engine = Engine::new(&mut net, &mut arena, &config);
        engine.discover_from_source(s);
        let report = engine.finish();
        assert_eq!(report.created, 1);
        assert_eq!(arena.count(CircuitKind::Open), 1);
        assert!(net.node(s).unwrap().has_circuit(0, CircuitKind::Open));
    }

    #[test]
    fn first_pole_loop_never_closes() {
        let mut net = Network::new();
        let s = net.add_node("B", NodeKind::PowerSource(PowerSource { enabled: true }));
        let j = net.add_node("J", NodeKind::Junction(Junction::default()));
        let sw = net.add_node("S1", NodeKind::Switch(OnOffSwitch { on: true }));
        wire(&mut net, s, 0, j, 0);
        wire(&mut net, j, 1, sw, 0);
        // Contact 1 of the switch shorts its two poles back into the junction.
        let k = net.add_cable(CableMode::Unifilar);
        net.attach(sw, 1, k, Side::A, Pole::First).unwrap();
        net.attach(j, 2, k, Side::B, Pole::First).unwrap();

        let mut arena = CircuitArena::new();
        let config = EngineConfig::default();
        let mut engine = Engine::new(&mut net, &mut arena, &config);
        engine.discover_from_source(s);
        let report = engine.finish();
        arena.verify().unwrap();
        // First pole only loops back into the junction; nothing reaches pole 2.
        assert_eq!(report.closed, 0);
        assert!(report.abandoned(Abandon::Cycle) > 0);
    }

    #[test]
    fn depth_limit_ends_walk() {
        let mut net = Network::new();
        let s = net.add_node("B", NodeKind::PowerSource(PowerSource { enabled: true }));
        let mut prev = (s, 0);
        let mut last = s;
        for i in 0..6 {
            let n = net.add_node(format!("S{i}"), NodeKind::Switch(OnOffSwitch { on: true }));
            wire(&mut net, prev.0, prev.1, n, 0);
            prev = (n, 1);
            last = n;
        }
        let mut arena = CircuitArena::new();
        let config = EngineConfig {
            max_depth: 3,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&mut net, &mut arena, &config);
        engine.discover_from_source(s);
        let report = engine.finish();
        assert!(report.abandoned(Abandon::DepthLimit) >= 1);
        assert!(!net.node(last).unwrap().has_any_circuits());
        assert_eq!(arena.len(), 1);
    }
}
