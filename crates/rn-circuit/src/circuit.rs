//! Circuits and the arena that owns them.
//!
//! A circuit is one segment of a tree. Roots start at a power source. A
//! parent ends with a half passage at a branch node (entered, not left) and
//! each child starts at that node with a passage that leaves but was not
//! entered, so counters summed over a tree match one flat path per leaf.
//!
//! Every registration goes through [`register_items`]/[`unregister_items`].
//! A circuit is freed only once it holds no registration.

use std::collections::BTreeMap;

use rn_core::{CircuitId, CircuitKind, IdAlloc, NodeId, Pole};
use rn_graph::{ContactPole, Flow, Network};
use tracing::debug;

use crate::item::{Item, NodePassage};
use crate::report::Abandon;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    id: CircuitId,
    source: NodeId,
    kind: CircuitKind,
    enabled: bool,
    items: Vec<Item>,
    parent: Option<CircuitId>,
    children: Vec<CircuitId>,
    closed_children: usize,
}

impl Circuit {
    pub fn id(&self) -> CircuitId {
        self.id
    }

    /// Power source the tree grows from.
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn kind(&self) -> CircuitKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn parent(&self) -> Option<CircuitId> {
        self.parent
    }

    pub fn children(&self) -> &[CircuitId] {
        &self.children
    }

    pub fn closed_children(&self) -> usize {
        self.closed_children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn last_passage(&self) -> Option<&NodePassage> {
        self.items.last().and_then(Item::as_node)
    }

    /// Node passages only.
    pub fn nodes(&self) -> impl Iterator<Item = &NodePassage> {
        self.items.iter().filter_map(Item::as_node)
    }
}

pub(crate) fn register_items(net: &mut Network, id: CircuitId, kind: CircuitKind, items: &[Item]) {
    for item in items {
        match item {
            Item::Node(p) => net.register_passages(p.node, id, kind, &[p.passage()]),
            Item::Cable(c) => net.register_cable(c.cable, id, kind, c.pole),
        }
    }
}

pub(crate) fn unregister_items(net: &mut Network, id: CircuitId, kind: CircuitKind, items: &[Item]) {
    for item in items {
        match item {
            Item::Node(p) => net.unregister_passages(p.node, id, kind, &[p.passage()]),
            Item::Cable(c) => net.unregister_cable(c.cable, id, kind, c.pole),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CircuitArena {
    circuits: BTreeMap<CircuitId, Circuit>,
    ids: IdAlloc,
    roots: BTreeMap<NodeId, Vec<CircuitId>>,
}

impl CircuitArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CircuitId) -> Option<&Circuit> {
        self.circuits.get(&id)
    }

    pub fn contains(&self, id: CircuitId) -> bool {
        self.circuits.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Circuit> {
        self.circuits.values()
    }

    /// Total circuits ever allocated.
    pub fn allocated(&self) -> u32 {
        self.ids.issued()
    }

    pub fn roots_of(&self, source: NodeId) -> &[CircuitId] {
        self.roots.get(&source).map_or(&[], Vec::as_slice)
    }

    pub fn count(&self, kind: CircuitKind) -> usize {
        self.iter().filter(|c| c.kind == kind).count()
    }

    /// Leaves of `kind`: one per complete path.
    pub fn leaves(&self, kind: CircuitKind) -> impl Iterator<Item = &Circuit> {
        self.iter().filter(move |c| c.kind == kind && c.is_leaf())
    }

    /// Number of ancestors.
    pub fn depth(&self, id: CircuitId) -> usize {
        let mut depth = 0;
        let mut cur = self.circuit(id).parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.circuit(p).parent;
        }
        depth
    }

    /// Items from the source down to the end of `id`, with branch
    /// boundaries merged back into single passages.
    pub fn full_path(&self, id: CircuitId) -> Vec<Item> {
        let c = self.circuit(id);
        self.prefix(id, c.items.len() - 1)
    }

    /// Like [`CircuitArena::full_path`], stopping after item `index` of `id`.
    pub fn prefix(&self, id: CircuitId, index: usize) -> Vec<Item> {
        let c = self.circuit(id);
        let mut path = match c.parent {
            Some(p) => self.full_path(p),
            None => Vec::new(),
        };
        let items = &c.items[..=index];
        let mut rest = items;
        if let (Some(Item::Node(prev)), Some(Item::Node(first))) = (path.last_mut(), items.first()) {
            if prev.node == first.node && prev.to.is_none() && first.from.is_none() {
                prev.to = first.to;
                rest = &items[1..];
            }
        }
        path.extend_from_slice(rest);
        path
    }

    /// `from` of the passage at `index`. A child's first passage enters
    /// through its parent's branch passage.
    pub fn effective_from(&self, id: CircuitId, index: usize) -> Option<ContactPole> {
        let c = self.circuit(id);
        let passage = c.items.get(index)?.as_node()?;
        if passage.from.is_some() || index != 0 {
            return passage.from;
        }
        let parent = self.circuit(c.parent?);
        parent.last_passage().and_then(|p| p.from)
    }

    fn siblings(&self, parent: Option<CircuitId>, source: NodeId) -> &[CircuitId] {
        match parent {
            Some(p) => &self.circuit(p).children,
            None => self.roots_of(source),
        }
    }

    fn is_duplicate(
        &self,
        parent: Option<CircuitId>,
        source: NodeId,
        items: &[Item],
        except: Option<CircuitId>,
    ) -> bool {
        self.siblings(parent, source)
            .iter()
            .filter(|s| Some(**s) != except)
            .any(|s| self.circuit(*s).items == items)
    }

    /// True if `a` and `b` share a parent (or are roots of one source) and
    /// hold the same items.
    pub fn same_as(&self, a: CircuitId, b: CircuitId) -> bool {
        let (ca, cb) = (self.circuit(a), self.circuit(b));
        a != b && ca.parent == cb.parent && ca.source == cb.source && ca.items == cb.items
    }

    /// True if a sibling of `id` holds the same items.
    pub fn has_twin(&self, id: CircuitId) -> bool {
        let c = self.circuit(id);
        self.siblings(c.parent, c.source)
            .iter()
            .any(|s| self.same_as(*s, id))
    }

    /// Allocate, link and register a new circuit.
    pub fn spawn(
        &mut self,
        net: &mut Network,
        parent: Option<CircuitId>,
        source: NodeId,
        kind: CircuitKind,
        items: Vec<Item>,
    ) -> Result<CircuitId, Abandon> {
        assert!(!items.is_empty(), "circuits hold at least one item");
        if let Some(p) = parent {
            let branch = self.circuit(p).last_passage();
            let first = items.first().and_then(Item::as_node);
            assert!(
                matches!((branch, first), (Some(b), Some(f)) if b.is_half() && b.node == f.node && f.from.is_none()),
                "child circuit must start where its parent branches"
            );
        }
        if self.is_duplicate(parent, source, &items, None) {
            return Err(Abandon::Duplicate);
        }

        let id = self.ids.next_id();
        let len = items.len();
        self.circuits.insert(
            id,
            Circuit {
                id,
                source,
                kind,
                enabled: false,
                items,
                parent,
                children: Vec::new(),
                closed_children: 0,
            },
        );
        match parent {
            Some(p) => self.circuit_mut(p).children.push(id),
            None => self.roots.entry(source).or_default().push(id),
        }
        self.enable(net, id);
        debug!(circuit = %id, ?kind, ?parent, len, "circuit spawned");

        if kind == CircuitKind::Closed {
            if let Some(p) = parent {
                self.child_closed(net, p);
            }
        }
        Ok(id)
    }

    /// Grow an enabled leaf in place.
    ///
    /// `items[0]` completes the leaf's trailing half passage; the rest is
    /// appended. Only the new registrations are made.
    pub fn extend(&mut self, net: &mut Network, id: CircuitId, items: &[Item]) -> Result<(), Abandon> {
        let c = self.circuit(id);
        assert!(c.enabled && c.is_leaf(), "only enabled leaves can be extended");
        let Some(Item::Node(first)) = items.first() else {
            panic!("extension must start with a node passage");
        };
        let last = c.last_passage().copied();
        assert!(
            matches!(last, Some(l) if l.is_half() && l.node == first.node && l.from == first.from),
            "extension must complete the trailing half passage"
        );
        let Some(to) = first.to else {
            return Ok(());
        };

        let mut grown = c.items.clone();
        if let Some(slot) = grown.last_mut() {
            *slot = Item::Node(*first);
        }
        grown.extend_from_slice(&items[1..]);
        if self.is_duplicate(c.parent, c.source, &grown, Some(id)) {
            return Err(Abandon::Duplicate);
        }

        let kind = c.kind;
        net.add_flow(first.node, kind, to, Flow::Exit);
        register_items(net, id, kind, &items[1..]);
        self.circuit_mut(id).items = grown;
        debug!(circuit = %id, added = items.len() - 1, "circuit extended");
        Ok(())
    }

    /// A leaf now ends back at its source: promote it and its ancestors.
    pub fn mark_closed(&mut self, net: &mut Network, id: CircuitId) {
        let c = self.circuit(id);
        if c.kind == CircuitKind::Closed {
            return;
        }
        let parent = c.parent;
        self.retype(net, id, CircuitKind::Closed);
        if let Some(p) = parent {
            self.child_closed(net, p);
        }
    }

    fn child_closed(&mut self, net: &mut Network, parent: CircuitId) {
        let mut next = Some(parent);
        while let Some(p) = next {
            let c = self.circuit_mut(p);
            c.closed_children += 1;
            if c.kind == CircuitKind::Closed {
                break;
            }
            next = c.parent;
            self.retype(net, p, CircuitKind::Closed);
            debug!(circuit = %p, "circuit promoted");
        }
    }

    fn child_opened(&mut self, net: &mut Network, parent: CircuitId) {
        let mut next = Some(parent);
        while let Some(p) = next {
            let c = self.circuit_mut(p);
            assert!(c.closed_children > 0, "closed child count underflow on {p}");
            c.closed_children -= 1;
            if c.closed_children > 0 {
                break;
            }
            next = c.parent;
            self.retype(net, p, CircuitKind::Open);
            debug!(circuit = %p, "circuit demoted");
        }
    }

    fn retype(&mut self, net: &mut Network, id: CircuitId, kind: CircuitKind) {
        let c = self
            .circuits
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown circuit {id}"));
        if c.kind == kind {
            return;
        }
        if c.enabled {
            unregister_items(net, id, c.kind, &c.items);
            register_items(net, id, kind, &c.items);
        }
        c.kind = kind;
    }

    fn enable(&mut self, net: &mut Network, id: CircuitId) {
        let c = self
            .circuits
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown circuit {id}"));
        assert!(!c.enabled, "circuit {id} enabled twice");
        register_items(net, id, c.kind, &c.items);
        c.enabled = true;
    }

    fn disable(&mut self, net: &mut Network, id: CircuitId) {
        let c = self
            .circuits
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown circuit {id}"));
        assert!(c.enabled, "circuit {id} disabled twice");
        unregister_items(net, id, c.kind, &c.items);
        c.enabled = false;
    }

    /// Unregister and free `id` with its whole subtree, demoting ancestors
    /// as needed. Returns the number of circuits freed.
    pub fn delete(&mut self, net: &mut Network, id: CircuitId) -> usize {
        let c = self.circuit(id);
        let (parent, kind, source) = (c.parent, c.kind, c.source);
        let freed = self.free_tree(net, id);
        match parent {
            Some(p) => {
                self.circuit_mut(p).children.retain(|c| *c != id);
                if kind == CircuitKind::Closed {
                    self.child_opened(net, p);
                }
            }
            None => {
                if let Some(list) = self.roots.get_mut(&source) {
                    list.retain(|c| *c != id);
                    if list.is_empty() {
                        self.roots.remove(&source);
                    }
                }
            }
        }
        debug!(circuit = %id, freed, "circuit deleted");
        freed
    }

    fn free_tree(&mut self, net: &mut Network, id: CircuitId) -> usize {
        let children = self.circuit(id).children.clone();
        let mut freed = 0;
        for child in children {
            freed += self.free_tree(net, child);
        }
        if self.circuit(id).enabled {
            self.disable(net, id);
        }
        let c = self
            .circuits
            .remove(&id)
            .unwrap_or_else(|| panic!("unknown circuit {id}"));
        assert!(!c.enabled, "circuit {id} freed while registered");
        freed + 1
    }

    fn drop_children(&mut self, net: &mut Network, id: CircuitId) -> usize {
        let children = std::mem::take(&mut self.circuit_mut(id).children);
        let freed = children.into_iter().map(|c| self.free_tree(net, c)).sum();
        self.circuit_mut(id).closed_children = 0;
        freed
    }

    /// Keep items up to `index` (a node passage, kept as a half passage),
    /// free every child and re-enable as `Open`. Returns circuits freed.
    pub fn truncate(&mut self, net: &mut Network, id: CircuitId, index: usize) -> usize {
        assert!(index > 0, "truncating at the first item deletes the circuit");
        assert!(
            matches!(self.circuit(id).items.get(index), Some(Item::Node(_))),
            "truncation point must be a node passage"
        );
        let freed = self.drop_children(net, id);
        let c = self.circuit(id);
        let (was, parent) = (c.kind, c.parent);

        self.disable(net, id);
        let c = self.circuit_mut(id);
        c.items.truncate(index + 1);
        if let Some(last) = c.items.last_mut().and_then(Item::as_node_mut) {
            last.to = None;
        }
        c.kind = CircuitKind::Open;
        self.enable(net, id);

        if was == CircuitKind::Closed {
            if let Some(p) = parent {
                self.child_opened(net, p);
            }
        }
        debug!(circuit = %id, index, freed, "circuit truncated");
        freed
    }

    /// Split `id` at the node passage `index`: `id` keeps the prefix ending
    /// in a half passage, a new child takes the suffix and `id`'s children.
    /// Splitting at a dangling end leaves the child with one passage.
    pub fn split(&mut self, net: &mut Network, id: CircuitId, index: usize) -> CircuitId {
        let c = self.circuit(id);
        assert!(index < c.items.len(), "split point out of range");
        let Some(&Item::Node(passage)) = c.items.get(index) else {
            panic!("split point must be a node passage");
        };
        let Some(to) = passage.to else {
            panic!("split point must leave the node");
        };
        let (kind, source) = (c.kind, c.source);
        let tail: Vec<Item> = c.items[index + 1..].to_vec();

        net.remove_flow(passage.node, kind, to, Flow::Exit);
        unregister_items(net, id, kind, &tail);

        let suffix = self.ids.next_id();
        let c = self.circuit_mut(id);
        c.items.truncate(index + 1);
        if let Some(last) = c.items.last_mut().and_then(Item::as_node_mut) {
            last.to = None;
        }
        let grandchildren = std::mem::replace(&mut c.children, vec![suffix]);
        let closed = std::mem::replace(
            &mut c.closed_children,
            usize::from(kind == CircuitKind::Closed),
        );

        let mut items = Vec::with_capacity(tail.len() + 1);
        items.push(Item::Node(NodePassage {
            node: passage.node,
            from: None,
            to: Some(to),
        }));
        items.extend(tail);
        self.circuits.insert(
            suffix,
            Circuit {
                id: suffix,
                source,
                kind,
                enabled: false,
                items,
                parent: Some(id),
                children: grandchildren.clone(),
                closed_children: closed,
            },
        );
        for g in grandchildren {
            self.circuit_mut(g).parent = Some(suffix);
        }
        self.enable(net, suffix);
        debug!(circuit = %id, suffix = %suffix, index, "circuit split");
        suffix
    }

    /// Delete every circuit.
    pub fn clear(&mut self, net: &mut Network) -> usize {
        let roots: Vec<CircuitId> = self.roots.values().flatten().copied().collect();
        roots.into_iter().map(|r| self.delete(net, r)).sum()
    }

    /// Check tree and type invariants. Used by tests and debug tooling.
    pub fn verify(&self) -> Result<(), String> {
        for c in self.iter() {
            if !c.enabled {
                return Err(format!("circuit {} is stored disabled", c.id));
            }
            let closed = c
                .children
                .iter()
                .filter(|ch| self.circuit(**ch).kind == CircuitKind::Closed)
                .count();
            if closed != c.closed_children {
                return Err(format!(
                    "circuit {} counts {} closed children, has {closed}",
                    c.id, c.closed_children
                ));
            }
            if c.is_leaf() {
                let ends_at_source = matches!(
                    c.last_passage(),
                    Some(p) if p.node == c.source && p.to.is_none()
                        && p.from.is_some_and(|f| f.pole == Pole::Second)
                );
                if (c.kind == CircuitKind::Closed) != ends_at_source {
                    return Err(format!("leaf {} is {:?} but ends_at_source={ends_at_source}", c.id, c.kind));
                }
            } else {
                if (c.kind == CircuitKind::Closed) != (c.closed_children > 0) {
                    return Err(format!("branch {} type disagrees with its children", c.id));
                }
                if !c.last_passage().is_some_and(NodePassage::is_half) {
                    return Err(format!("branch {} does not end in a half passage", c.id));
                }
            }
            match c.parent {
                Some(p) => {
                    let parent = self
                        .get(p)
                        .ok_or_else(|| format!("circuit {} has dangling parent {p}", c.id))?;
                    if !parent.children.contains(&c.id) {
                        return Err(format!("parent {p} does not list child {}", c.id));
                    }
                    let first = c.items.first().and_then(Item::as_node);
                    let branch = parent.last_passage();
                    if !matches!((first, branch), (Some(f), Some(b)) if f.node == b.node && f.from.is_none()) {
                        return Err(format!("child {} does not start at its branch node", c.id));
                    }
                }
                None => {
                    if !self.roots_of(c.source).contains(&c.id) {
                        return Err(format!("root {} not listed under its source", c.id));
                    }
                }
            }
            let siblings = self.siblings(c.parent, c.source);
            if siblings.iter().any(|s| self.same_as(*s, c.id)) {
                return Err(format!("circuit {} has an identical sibling", c.id));
            }
        }
        Ok(())
    }

    fn circuit(&self, id: CircuitId) -> &Circuit {
        self.circuits
            .get(&id)
            .unwrap_or_else(|| panic!("unknown circuit {id}"))
    }

    fn circuit_mut(&mut self, id: CircuitId) -> &mut Circuit {
        self.circuits
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown circuit {id}"))
    }
}
