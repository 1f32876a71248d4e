//! Reach-next: feed a contact that lost its circuit from a neighbouring
//! live circuit, searching backwards against the flow of current.

use rn_core::{CircuitId, CircuitKind, NodeId, Pole};
use rn_graph::ContactPole;
use tracing::{debug, trace};

use crate::engine::{hop_target, Engine};
use crate::item::{contains_node, passages_at, CablePassage, Item, NodePassage};
use crate::report::Abandon;

impl Engine<'_> {
    /// Try every contact pole of `goal` that carries nothing.
    pub(crate) fn default_reach_next_open(&mut self, goal: NodeId) {
        let Ok(node) = self.net.node(goal) else {
            return;
        };
        if node.is_source() {
            return;
        }
        let targets: Vec<ContactPole> = (0..node.contacts().len())
            .flat_map(|c| Pole::BOTH.map(|p| ContactPole::new(c, p)))
            .collect();
        for at in targets {
            if self.node(goal).has_any_circuit_on_pole(at.contact, at.pole).is_none() {
                self.try_reach_next_open(goal, at);
            }
        }
    }

    /// Search back from the cable entering `goal` at `at` for a circuit
    /// that can be grown to enter there. Returns true on success.
    pub(crate) fn try_reach_next_open(&mut self, goal: NodeId, at: ContactPole) -> bool {
        let Some((binding, end)) = hop_target(self.net, goal, at) else {
            return false;
        };
        // Collected goal-first; reversed once a feeding circuit is found.
        let mut tail = vec![
            Item::Node(NodePassage {
                node: goal,
                from: Some(at),
                to: None,
            }),
            Item::Cable(CablePassage {
                cable: binding.cable,
                side: !binding.side,
                pole: at.pole,
            }),
        ];
        let reached = self.search_back(end.node, ContactPole::new(end.contact, at.pole), &mut tail, 1);
        if reached {
            debug!(goal = %goal, contact = at.contact, pole = %at.pole, "contact reached from a live circuit");
            self.rescan_node(goal);
        }
        reached
    }

    fn search_back(&mut self, node: NodeId, exit: ContactPole, tail: &mut Vec<Item>, depth: usize) -> bool {
        if depth > self.config.max_depth {
            self.report.abandon(Abandon::DepthLimit);
            return false;
        }
        if contains_node(tail, node, exit) {
            self.report.abandon(Abandon::Cycle);
            return false;
        }
        let n = self.node(node);
        if n.is_source() {
            self.report.abandon(Abandon::ForeignSource);
            return false;
        }
        if n.has_any_circuits() {
            return self.extend_existing(node, exit, tail);
        }
        for entry in n.active_connections(exit, true) {
            if contains_node(tail, node, entry) {
                self.report.abandon(Abandon::Cycle);
                continue;
            }
            let Some((binding, end)) = hop_target(self.net, node, entry) else {
                continue;
            };
            let mark = tail.len();
            tail.push(Item::Node(NodePassage {
                node,
                from: Some(entry),
                to: Some(exit),
            }));
            tail.push(Item::Cable(CablePassage {
                cable: binding.cable,
                side: !binding.side,
                pole: entry.pole,
            }));
            if self.search_back(end.node, ContactPole::new(end.contact, entry.pole), tail, depth + 1) {
                return true;
            }
            tail.truncate(mark);
        }
        false
    }

    /// Find a circuit entering `node` whose wiring can leave through `exit`
    /// and grow it along the reversed `tail`.
    fn extend_existing(&mut self, node: NodeId, exit: ContactPole, tail: &[Item]) -> bool {
        let forward: Vec<Item> = tail.iter().rev().copied().collect();
        for id in self.node(node).all_circuits() {
            let Some(c) = self.arena.get(id) else {
                continue;
            };
            let entered: Vec<(usize, NodePassage)> = passages_at(c.items(), node)
                .filter(|(_, p)| p.from.is_some())
                .map(|(i, p)| (i, *p))
                .collect();
            for (index, passage) in entered {
                let Some(from) = passage.from else {
                    continue;
                };
                if passage.to == Some(exit)
                    || !self.node(node).active_connections(from, false).contains(&exit)
                    || self.covered_exits(node, from).contains(&exit)
                {
                    continue;
                }
                let prefix = self.arena.prefix(id, index);
                let clash = forward
                    .iter()
                    .filter_map(Item::as_node)
                    .any(|p| [p.from, p.to].into_iter().flatten().any(|at| contains_node(&prefix, p.node, at)));
                if clash || contains_node(&prefix, node, exit) {
                    self.report.abandon(Abandon::Cycle);
                    continue;
                }
                if self.attach_tail(id, index, passage, exit, &forward) {
                    return true;
                }
            }
        }
        false
    }

    fn attach_tail(&mut self, id: CircuitId, index: usize, passage: NodePassage, exit: ContactPole, forward: &[Item]) -> bool {
        let Some(c) = self.arena.get(id) else {
            return false;
        };
        let at_end = index + 1 == c.items().len() && passage.to.is_none();
        let source = c.source();

        if at_end && c.is_leaf() {
            let mut items = vec![Item::Node(passage.with_to(Some(exit)))];
            items.extend_from_slice(forward);
            return match self.arena.extend(self.net, id, &items) {
                Ok(()) => {
                    self.report.extended += 1;
                    true
                }
                Err(why) => {
                    trace!(circuit = %id, ?why, "reach-next extension refused");
                    self.report.abandon(why);
                    false
                }
            };
        }
        if !at_end {
            self.arena.split(self.net, id, index);
            self.report.split += 1;
        }
        let mut items = vec![Item::Node(NodePassage {
            node: passage.node,
            from: None,
            to: Some(exit),
        })];
        items.extend_from_slice(forward);
        match self.arena.spawn(self.net, Some(id), source, CircuitKind::Open, items) {
            Ok(_) => {
                self.report.created += 1;
                true
            }
            Err(why) => {
                self.report.abandon(why);
                false
            }
        }
    }
}
