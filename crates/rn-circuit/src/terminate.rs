//! Truncation and deletion of circuits the topology no longer supports.

use rn_core::{CircuitId, CircuitKind, NodeId};
use rn_graph::{CableEnd, ContactPole, NodeKind};
use tracing::debug;

use crate::engine::{hop_target, Engine};
use crate::item::{passages_at, CablePassage, Item, NodePassage};

impl Engine<'_> {
    /// Index of the earliest item of `id` the current wiring no longer
    /// supports, always a node passage. `Some(0)` means nothing survives.
    pub(crate) fn first_broken(&self, id: CircuitId) -> Option<usize> {
        let c = self.arena.get(id)?;
        let items = c.items();
        for (index, item) in items.iter().enumerate() {
            match item {
                Item::Node(p) => {
                    if !self.passage_holds(id, index, p) {
                        return Some(index);
                    }
                    // A dangling end whose contact can now carry current on.
                    if let Some(to) = p.to {
                        let crosses = matches!(items.get(index + 1), Some(Item::Cable(_)));
                        if !crosses && hop_target(self.net, p.node, to).is_some() {
                            return Some(index);
                        }
                    }
                }
                Item::Cable(k) => {
                    let before = index.checked_sub(1).and_then(|i| items[i].as_node());
                    let after = items.get(index + 1).and_then(Item::as_node);
                    if !self.cable_joins(k, before, after) {
                        return Some(index.saturating_sub(1));
                    }
                }
            }
        }
        None
    }

    fn passage_holds(&self, id: CircuitId, index: usize, p: &NodePassage) -> bool {
        let Ok(node) = self.net.node(p.node) else {
            return false;
        };
        match (self.arena.effective_from(id, index), p.to) {
            (Some(from), Some(to)) => node.active_connections(from, false).contains(&to),
            // Source start passage.
            (None, Some(_)) => matches!(&node.kind, NodeKind::PowerSource(s) if s.enabled),
            _ => true,
        }
    }

    fn cable_joins(&self, k: &CablePassage, before: Option<&NodePassage>, after: Option<&NodePassage>) -> bool {
        let Ok(cable) = self.net.cable(k.cable) else {
            return false;
        };
        let bound = |side, node, at: Option<ContactPole>| {
            at.is_some_and(|at| {
                cable.get_node(side) == Some(CableEnd { node, contact: at.contact })
                    && at.pole == k.pole
                    && self
                        .net
                        .node(node)
                        .ok()
                        .and_then(|n| n.contact(at.contact))
                        .is_some_and(|c| c.contact_type(at.pole).is_connected())
            })
        };
        let near = before.is_some_and(|p| bound(k.side, p.node, p.to));
        let far = after.is_none_or(|p| bound(!k.side, p.node, p.from));
        near && far
    }

    /// Shorten `id` to end at item `index`, deleting it if nothing is left
    /// or if it now duplicates a sibling.
    pub(crate) fn cut(&mut self, id: CircuitId, index: usize) {
        if index == 0 {
            self.report.deleted += self.arena.delete(self.net, id);
            return;
        }
        self.report.deleted += self.arena.truncate(self.net, id, index);
        self.report.truncated += 1;
        if self.arena.has_twin(id) {
            debug!(circuit = %id, "truncated circuit duplicates a sibling");
            self.report.deleted += self.arena.delete(self.net, id);
        }
    }

    /// Longest prefix of a closed circuit that still holds.
    fn try_reach_open(&self, id: CircuitId) -> Option<usize> {
        self.first_broken(id)
    }

    /// A closed circuit lost part of its path: keep what still holds as an
    /// open circuit, or delete it.
    pub(crate) fn disable_or_terminate(&mut self, id: CircuitId) {
        if let Some(index) = self.try_reach_open(id) {
            debug!(circuit = %id, index, "closed circuit broken");
            self.cut(id, index);
        }
    }

    /// Cut an open circuit where it stopped holding. `done` collects the
    /// circuits already handled in this pass.
    pub(crate) fn terminate_here(&mut self, id: CircuitId, done: &mut Vec<CircuitId>) {
        if done.contains(&id) {
            return;
        }
        done.push(id);
        if let Some(index) = self.first_broken(id) {
            self.cut(id, index);
        }
    }

    /// Re-check `ids`, ancestors first. Returns the nodes the cut circuits
    /// passed before they were cut.
    pub(crate) fn revalidate_circuits(&mut self, mut ids: Vec<CircuitId>) -> Vec<NodeId> {
        ids.sort_by_key(|id| self.arena.depth(*id));
        ids.dedup();
        let mut done = Vec::new();
        let mut touched = Vec::new();
        for id in ids {
            let Some(c) = self.arena.get(id) else {
                continue;
            };
            let kind = c.kind();
            if self.first_broken(id).is_some() {
                self.collect_nodes(id, &mut touched);
            }
            match kind {
                CircuitKind::Closed => self.disable_or_terminate(id),
                CircuitKind::Open => self.terminate_here(id, &mut done),
            }
        }
        touched
    }

    /// Re-check every circuit passing `node` after its wiring changed.
    pub(crate) fn revalidate(&mut self, node: NodeId) -> Vec<NodeId> {
        let ids = self.node(node).all_circuits();
        self.revalidate_circuits(ids)
    }

    /// Nodes on the full path of `id` and of every circuit below it.
    fn collect_nodes(&self, id: CircuitId, out: &mut Vec<NodeId>) {
        let mut push = |items: &[Item]| {
            for p in items.iter().filter_map(Item::as_node) {
                if !out.contains(&p.node) {
                    out.push(p.node);
                }
            }
        };
        push(&self.arena.full_path(id));
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(c) = self.arena.get(cur) else {
                continue;
            };
            if cur != id {
                push(c.items());
            }
            stack.extend_from_slice(c.children());
        }
    }

    /// Let circuits that still stand grow back over `nodes` once a cut
    /// freed their contacts: re-scan each node, then feed what stayed dark.
    pub(crate) fn regrow(&mut self, nodes: &[NodeId]) {
        let live: Vec<NodeId> = nodes.iter().copied().filter(|n| self.net.node(*n).is_ok()).collect();
        for n in &live {
            self.rescan_node(*n);
        }
        for n in &live {
            self.default_reach_next_open(*n);
        }
    }

    /// Delete every circuit grown from `source`.
    pub(crate) fn drop_source(&mut self, source: NodeId) {
        let roots = self.arena.roots_of(source).to_vec();
        for root in roots {
            self.report.deleted += self.arena.delete(self.net, root);
        }
    }

    /// Open circuits entering a contact closed leaf `id` leaves through (or
    /// leaving where it enters) are cut before the clash.
    pub(crate) fn drop_reverse_voltage(&mut self, id: CircuitId) {
        let Some(c) = self.arena.get(id) else {
            return;
        };
        if c.kind() != CircuitKind::Closed || !c.is_leaf() {
            return;
        }
        let path = self.arena.full_path(id);
        for closed in path.iter().filter_map(Item::as_node) {
            while let Some((victim, index)) = self.reverse_clash(closed) {
                debug!(circuit = %victim, node = %closed.node, "reverse voltage dropped");
                self.cut(victim, index);
            }
        }
    }

    fn reverse_clash(&self, closed: &NodePassage) -> Option<(CircuitId, usize)> {
        let node = self.net.node(closed.node).ok()?;
        for victim in node.circuits(CircuitKind::Open) {
            let Some(c) = self.arena.get(victim) else {
                continue;
            };
            for (index, p) in passages_at(c.items(), closed.node) {
                if p.from.is_some() && p.from == closed.to {
                    return Some((victim, index.saturating_sub(2)));
                }
                if p.to.is_some() && p.to == closed.from {
                    return Some((victim, index));
                }
            }
        }
        None
    }
}
