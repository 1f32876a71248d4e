//! Errors returned by engine entry points.

use rn_core::{ButtonId, NodeId, RelayId, RnError};
use rn_graph::GraphError;
use thiserror::Error;

/// Caller mistakes. Abandoned search branches are not errors; see
/// [`crate::Abandon`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Core(#[from] RnError),

    #[error("Relay {0} does not exist")]
    UnknownRelay(RelayId),

    #[error("Button {0} does not exist")]
    UnknownButton(ButtonId),

    #[error("Node {node} is a {found}, expected a {expected}")]
    WrongKind {
        node: NodeId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Node {0} carries circuits; wiring flags can only change on an idle node")]
    Busy(NodeId),
}

pub type CircuitResult<T> = Result<T, CircuitError>;
