//! Panel document schema.

use rn_circuit::EngineConfig;
use rn_core::{CableMode, Pole};
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelDoc {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub relays: Vec<RelayDef>,
    #[serde(default)]
    pub buttons: Vec<ButtonDef>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub cables: Vec<CableDef>,
}

impl PanelDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: LATEST_VERSION,
            name: name.into(),
            engine: EngineConfig::default(),
            relays: Vec::new(),
            buttons: Vec::new(),
            nodes: Vec::new(),
            cables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub normally_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ButtonDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: ButtonStateDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStateDef {
    #[default]
    Normal,
    Pressed,
    Extracted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub id: String,
    pub name: String,
    pub kind: NodeKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindDef {
    PowerSource {
        #[serde(default)]
        enabled: bool,
    },
    Switch {
        #[serde(default)]
        on: bool,
    },
    Junction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disabled_contact: Option<usize>,
    },
    RelayContact {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay: Option<String>,
        #[serde(default)]
        swap: bool,
        #[serde(default)]
        flip: bool,
        #[serde(default = "default_central_connector")]
        central_connector: bool,
    },
    ButtonContact {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<String>,
        #[serde(default)]
        swap: bool,
        #[serde(default)]
        flip: bool,
        #[serde(default = "default_central_connector")]
        central_connector: bool,
        #[serde(default)]
        table: ButtonTableDef,
    },
    RelayCoil {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relay: Option<String>,
        #[serde(default)]
        relay_type: CoilTypeDef,
        #[serde(default)]
        second_contact: bool,
        #[serde(default)]
        delay_up_ms: u64,
        #[serde(default)]
        delay_down_ms: u64,
    },
}

impl NodeKindDef {
    /// Number of contacts a node of this kind exposes.
    pub fn contact_count(&self) -> usize {
        match self {
            NodeKindDef::PowerSource { .. } => 1,
            NodeKindDef::Switch { .. } | NodeKindDef::RelayCoil { .. } => 2,
            NodeKindDef::RelayContact { .. } | NodeKindDef::ButtonContact { .. } => 3,
            NodeKindDef::Junction { .. } => 4,
        }
    }

    /// Whether a cable may bind `contact` under this configuration.
    pub fn is_contact_usable(&self, contact: usize) -> bool {
        match self {
            NodeKindDef::Junction { disabled_contact } => *disabled_contact != Some(contact),
            NodeKindDef::RelayCoil { second_contact, .. } => contact == 0 || *second_contact,
            NodeKindDef::RelayContact {
                central_connector, ..
            }
            | NodeKindDef::ButtonContact {
                central_connector, ..
            } => contact != 1 || *central_connector,
            _ => true,
        }
    }

    pub fn is_deviator(&self) -> bool {
        matches!(
            self,
            NodeKindDef::RelayContact { .. } | NodeKindDef::ButtonContact { .. }
        )
    }
}

fn default_central_connector() -> bool {
    true
}

/// Up/down contact state per button state (normal, pressed, extracted).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ButtonTableDef {
    #[serde(default)]
    pub up: [bool; 3],
    #[serde(default)]
    pub down: [bool; 3],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoilTypeDef {
    #[default]
    Normal,
    Polarized,
    PolarizedInverted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CableDef {
    pub id: String,
    #[serde(default)]
    pub mode: CableMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<CableEndDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<CableEndDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CableEndDef {
    pub node: String,
    pub contact: usize,
    #[serde(default = "both_poles")]
    pub poles: Vec<Pole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough: Vec<Pole>,
}

fn both_poles() -> Vec<Pole> {
    Pole::BOTH.to_vec()
}
