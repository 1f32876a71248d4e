//! Incremental re-scan of circuits passing a node whose wiring gained
//! connections.

use rn_core::{CircuitId, NodeId};
use rn_graph::ContactPole;
use tracing::debug;

use crate::engine::{set_last_to, Anchor, Engine, Step, Walk};
use crate::item::{passages_at, Item};
use crate::report::PassReport;

impl Engine<'_> {
    /// Grow every circuit passing `node` along continuations nothing
    /// covers yet. Closed circuits go first.
    ///
    /// A pass grows at most one passage per circuit, and a split moves the
    /// rest of a circuit into a new child, so passes repeat until one
    /// grows nothing.
    pub(crate) fn rescan_node(&mut self, node: NodeId) {
        for _ in 0..=self.config.max_depth {
            let before = grown(&self.report);
            let snapshot = self.node(node).all_circuits();
            for id in snapshot {
                if self.arena.contains(id) {
                    self.rescan_circuit(id, node);
                }
            }
            if grown(&self.report) == before {
                return;
            }
        }
    }

    /// At most one passage of `id` at `node` is grown per call.
    fn rescan_circuit(&mut self, id: CircuitId, node: NodeId) {
        let Some(circuit) = self.arena.get(id) else {
            return;
        };
        let source = circuit.source();
        let entered: Vec<(usize, ContactPole)> = passages_at(circuit.items(), node)
            .filter_map(|(i, p)| p.from.map(|f| (i, f)))
            .collect();

        for (index, from) in entered {
            let covered = self.covered_exits(node, from);
            let exits: Vec<ContactPole> = self
                .node(node)
                .active_connections(from, false)
                .into_iter()
                .filter(|at| !covered.contains(at))
                .collect();
            if exits.is_empty() {
                continue;
            }
            let mut upstream = self.arena.prefix(id, index);
            set_last_to(&mut upstream, None);
            let probe = Walk {
                anchor: Anchor::Root,
                source,
                upstream,
                pending: Vec::new(),
            };
            let steps = self.classify(&probe, node, Some(from), exits);
            if steps.is_empty() {
                continue;
            }
            // The source sits at depth zero.
            let depth = probe.upstream.iter().filter(|i| i.as_node().is_some()).count().saturating_sub(1);
            debug!(circuit = %id, node = %node, steps = steps.len(), "re-scan found continuations");
            self.grow_at(id, index, steps, depth);
            return;
        }
    }

    /// Exits at `node` already taken by some circuit entering through `from`.
    pub(crate) fn covered_exits(&self, node: NodeId, from: ContactPole) -> Vec<ContactPole> {
        let mut covered = Vec::new();
        for id in self.node(node).all_circuits() {
            let Some(c) = self.arena.get(id) else {
                continue;
            };
            for (index, p) in passages_at(c.items(), node) {
                if let Some(to) = p.to {
                    if self.arena.effective_from(id, index) == Some(from) {
                        covered.push(to);
                    }
                }
            }
        }
        covered
    }

    /// Continue circuit `id` at its node passage `index` along `steps`:
    /// in place for a bare leaf end, otherwise as children (splitting first
    /// when the passage already leaves the node).
    pub(crate) fn grow_at(&mut self, id: CircuitId, index: usize, steps: Vec<Step>, depth: usize) {
        let Some(c) = self.arena.get(id) else {
            return;
        };
        let Some(&Item::Node(passage)) = c.items().get(index) else {
            return;
        };
        let at_end = index + 1 == c.items().len() && passage.to.is_none();
        let (source, leaf) = (c.source(), c.is_leaf());

        if at_end && leaf {
            if let Some(mut walk) = self.extend_walk(id) {
                if let Err(why) = self.continue_from(&mut walk, passage.node, steps, depth) {
                    self.report.abandon(why);
                }
            }
            return;
        }
        if !at_end {
            self.arena.split(self.net, id, index);
            self.report.split += 1;
        }
        for step in &steps {
            self.branch(source, id, passage.node, *step, &steps, depth);
        }
    }
}

fn grown(report: &PassReport) -> usize {
    report.created + report.extended + report.split
}
