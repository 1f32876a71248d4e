//! Engine tunables.

use serde::{Deserialize, Serialize};

/// Options for the propagation engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum node depth of one discovery walk (loop safety valve)
    pub max_depth: usize,
    /// Maximum relay transitions applied while settling one operation
    pub max_settle_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_settle_steps: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"max_depth": 12}"#).unwrap();
        assert_eq!(cfg.max_depth, 12);
        assert_eq!(cfg.max_settle_steps, 10_000);
    }
}
