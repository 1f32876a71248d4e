//! rn-circuit: circuit propagation engine for relaynet.
//!
//! Provides:
//! - The circuit tree arena (open/closed circuits, split, truncate, dedup)
//! - Discovery walks from power sources, incremental re-scan and reach-next
//! - Truncation and reverse-voltage cleanup after topology changes
//! - Relays and buttons driving contact nodes, with delayed coil transitions
//! - `Session`, the single entry point that owns one panel
//!
//! # Example
//!
//! ```
//! use rn_core::{CableMode, CircuitKind, Pole, Side};
//! use rn_graph::{NodeKind, OnOffSwitch, PowerSource, RelayCoil, RelayState};
//! use rn_circuit::{EngineConfig, Session};
//!
//! let mut s = Session::new(EngineConfig::default());
//! let r = s.add_relay("R1", false);
//! let b = s.add_node("B", NodeKind::PowerSource(PowerSource { enabled: true })).unwrap();
//! let sw = s.add_node("S1", NodeKind::Switch(OnOffSwitch { on: true })).unwrap();
//! let coil = RelayCoil { relay: Some(r), ..RelayCoil::default() };
//! let c = s.add_node("C1", NodeKind::RelayCoil(coil)).unwrap();
//!
//! let k1 = s.add_cable(CableMode::BifilarBoth);
//! let k2 = s.add_cable(CableMode::BifilarBoth);
//! for pole in Pole::BOTH {
//!     s.attach_cable(b, 0, k1, Side::A, pole).unwrap();
//!     s.attach_cable(sw, 0, k1, Side::B, pole).unwrap();
//!     s.attach_cable(sw, 1, k2, Side::A, pole).unwrap();
//!     s.attach_cable(c, 0, k2, Side::B, pole).unwrap();
//! }
//!
//! assert_eq!(s.circuits().count(CircuitKind::Closed), 1);
//! assert_eq!(s.relay(r).unwrap().state(), RelayState::Up);
//!
//! s.set_switch_on(sw, false).unwrap();
//! assert_eq!(s.circuits().count(CircuitKind::Closed), 0);
//! assert_eq!(s.relay(r).unwrap().state(), RelayState::Down);
//! s.verify().unwrap();
//! ```

pub mod circuit;
pub mod config;
mod engine;
pub mod error;
pub mod item;
mod reach;
pub mod relay;
pub mod report;
mod rescan;
pub mod scheduler;
pub mod session;
mod terminate;

// Re-exports for ergonomics
pub use circuit::{Circuit, CircuitArena};
pub use config::EngineConfig;
pub use engine::{SOURCE_EXIT, SOURCE_RETURN};
pub use error::{CircuitError, CircuitResult};
pub use item::{CablePassage, Item, NodePassage};
pub use relay::{position_for, Button, Relay};
pub use report::{Abandon, PassReport};
pub use scheduler::Scheduler;
pub use session::Session;
