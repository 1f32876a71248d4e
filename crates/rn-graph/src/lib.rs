//! rn-graph: topology layer for relaynet.
//!
//! Provides:
//! - Contacts with per-pole, per-kind entrance/exit counters
//! - Node kinds with their wiring tables (`active_connections`)
//! - Bifilar cables with per-pole circuit lists and derived power
//! - The `Network` arena with attach/detach and edge-triggered events
//!
//! # Example
//!
//! ```
//! use rn_core::{CableMode, Pole, Side};
//! use rn_graph::{ContactPole, Network, NodeKind, OnOffSwitch};
//!
//! let mut net = Network::new();
//! let a = net.add_node("S1", NodeKind::Switch(OnOffSwitch { on: true }));
//! let k = net.add_cable(CableMode::Bifilar1);
//! net.attach(a, 0, k, Side::A, Pole::First).unwrap();
//!
//! let node = net.node(a).unwrap();
//! let out = node.active_connections(ContactPole::new(0, Pole::First), false);
//! assert_eq!(out, vec![ContactPole::new(1, Pole::First)]);
//! ```

pub mod cable;
pub mod contact;
pub mod error;
pub mod events;
pub mod kind;
pub mod network;
pub mod node;
pub mod validate;

// Re-exports for ergonomics
pub use cable::{Cable, CableEnd};
pub use contact::{CableBinding, Contact, ContactPole, Flow};
pub use error::{GraphError, GraphResult};
pub use events::{Event, EventQueue, RelayState};
pub use kind::{
    ButtonContact, ButtonState, CoilType, ContactPosition, Deviator, Junction, NodeKind,
    OnOffSwitch, PowerSource, RelayCoil, RelayContact, StateChange, COMMON, DOWN, UP,
};
pub use network::Network;
pub use node::{Node, Passage};
pub use validate::validate_topology;
