//! Circuit path items.

use rn_core::{CableId, NodeId, Pole, Side};
use rn_graph::{ContactPole, Passage};

/// One traversal of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodePassage {
    pub node: NodeId,
    pub from: Option<ContactPole>,
    pub to: Option<ContactPole>,
}

impl NodePassage {
    pub fn passage(&self) -> Passage {
        Passage {
            from: self.from,
            to: self.to,
        }
    }

    /// Entered but not left.
    pub fn is_half(&self) -> bool {
        self.from.is_some() && self.to.is_none()
    }

    pub fn touches(&self, node: NodeId, at: ContactPole) -> bool {
        self.node == node && (self.from == Some(at) || self.to == Some(at))
    }

    pub fn with_to(self, to: Option<ContactPole>) -> Self {
        Self { to, ..self }
    }
}

/// One traversal of a cable. `side` is the end the current enters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CablePassage {
    pub cable: CableId,
    pub side: Side,
    pub pole: Pole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Node(NodePassage),
    Cable(CablePassage),
}

impl Item {
    pub fn as_node(&self) -> Option<&NodePassage> {
        match self {
            Item::Node(n) => Some(n),
            Item::Cable(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodePassage> {
        match self {
            Item::Node(n) => Some(n),
            Item::Cable(_) => None,
        }
    }

    pub fn as_cable(&self) -> Option<&CablePassage> {
        match self {
            Item::Cable(c) => Some(c),
            Item::Node(_) => None,
        }
    }
}

/// True if any passage in `items` enters or leaves `node` through `at`.
pub fn contains_node(items: &[Item], node: NodeId, at: ContactPole) -> bool {
    items
        .iter()
        .filter_map(Item::as_node)
        .any(|p| p.touches(node, at))
}

/// Node passages of `items` at `node`, with their indices.
pub fn passages_at(items: &[Item], node: NodeId) -> impl Iterator<Item = (usize, &NodePassage)> {
    items
        .iter()
        .enumerate()
        .filter_map(move |(i, item)| item.as_node().filter(|p| p.node == node).map(|p| (i, p)))
}
