//! Graph-specific error types.

use rn_core::{CableId, NodeId, Pole, RnError, Side};
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

/// Rejected topology edits and failed lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("Cable {0} does not exist")]
    UnknownCable(CableId),

    #[error("Node {node} has no contact {contact} (contacts={len})")]
    ContactOob {
        node: NodeId,
        contact: usize,
        len: usize,
    },

    #[error("Contact {contact} of node {node} cannot be wired")]
    ContactDisabled { node: NodeId, contact: usize },

    #[error("Cable {cable} side {side:?} is already bound to another contact")]
    EndBound { cable: CableId, side: Side },

    #[error("Contact {contact} of node {node} is bound to another cable")]
    ContactBound { node: NodeId, contact: usize },

    #[error("Pole {pole} of contact {contact} on node {node} is already connected")]
    PoleConnected {
        node: NodeId,
        contact: usize,
        pole: Pole,
    },

    #[error("Pole {pole} of contact {contact} on node {node} is not attached to cable {cable}")]
    PoleNotAttached {
        node: NodeId,
        contact: usize,
        pole: Pole,
        cable: CableId,
    },

    #[error("Node {node} is not a {expected}")]
    WrongKind { node: NodeId, expected: &'static str },

    #[error("Node {0} still carries circuits")]
    NodeBusy(NodeId),

    #[error("Cable {0} still carries circuits or is still bound")]
    CableBusy(CableId),

    #[error("Inconsistent topology: {what}")]
    Inconsistent { what: String },
}

impl From<GraphError> for RnError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownNode(id) => RnError::UnknownId { what: "node", id },
            GraphError::UnknownCable(id) => RnError::UnknownId { what: "cable", id },
            GraphError::ContactOob { contact, len, .. } => RnError::IndexOob {
                what: "contact",
                index: contact,
                len,
            },
            _ => RnError::InvalidArg {
                what: "rejected topology edit",
            },
        }
    }
}
