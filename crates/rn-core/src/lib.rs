//! rn-core: stable foundation for relaynet.
//!
//! Contains:
//! - ids (stable compact IDs for nodes, cables, circuits, relays)
//! - types (poles, sides, contact and circuit kinds, cable power)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod types;

// Re-exports: nice ergonomics for downstream crates
pub use error::{RnError, RnResult};
pub use ids::*;
pub use types::*;
