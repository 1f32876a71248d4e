//! Turning panel documents into live sessions and back.

use rn_circuit::Session;
use rn_core::{ButtonId, CableId, ContactType, Id, NodeId, Pole, RelayId, Side};
use rn_graph::{
    ButtonContact, ButtonState, CoilType, Deviator, Junction, Node, NodeKind, OnOffSwitch,
    PowerSource, RelayCoil, RelayContact,
};

use crate::schema::{
    ButtonDef, ButtonStateDef, ButtonTableDef, CableDef, CableEndDef, CoilTypeDef, NodeDef,
    NodeKindDef, PanelDoc, RelayDef,
};
use crate::validate::{validate_panel, ValidationError};
use crate::{ProjectError, ProjectResult};

/// Document ids of the objects a session was built from, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelHandles {
    pub relays: Vec<(String, RelayId)>,
    pub buttons: Vec<(String, ButtonId)>,
    pub nodes: Vec<(String, NodeId)>,
    pub cables: Vec<(String, CableId)>,
}

fn find(table: &[(String, Id)], key: &str) -> Option<Id> {
    table.iter().find(|(k, _)| k == key).map(|(_, id)| *id)
}

fn name_of(table: &[(String, Id)], id: Id) -> Option<&str> {
    table.iter().find(|(_, v)| *v == id).map(|(k, _)| k.as_str())
}

impl PanelHandles {
    pub fn relay(&self, key: &str) -> Option<RelayId> {
        find(&self.relays, key)
    }

    pub fn button(&self, key: &str) -> Option<ButtonId> {
        find(&self.buttons, key)
    }

    pub fn node(&self, key: &str) -> Option<NodeId> {
        find(&self.nodes, key)
    }

    pub fn cable(&self, key: &str) -> Option<CableId> {
        find(&self.cables, key)
    }

    pub fn node_key(&self, id: NodeId) -> Option<&str> {
        name_of(&self.nodes, id)
    }

    pub fn relay_key(&self, id: RelayId) -> Option<&str> {
        name_of(&self.relays, id)
    }
}

fn missing(id: &str, context: &str) -> ValidationError {
    ValidationError::MissingReference {
        id: id.to_string(),
        context: context.to_string(),
    }
}

/// Build a session from a validated document.
///
/// Sources are added disabled and switched on once all wiring is in place,
/// in document order, which amounts to one full discovery pass.
pub fn build_session(doc: &PanelDoc) -> ProjectResult<(Session, PanelHandles)> {
    validate_panel(doc)?;

    let mut session = Session::new(doc.engine.clone());
    let mut handles = PanelHandles::default();

    for relay in &doc.relays {
        let id = session.add_relay(relay.name.clone(), relay.normally_up);
        handles.relays.push((relay.id.clone(), id));
    }
    for button in &doc.buttons {
        let id = session.add_button(button.name.clone());
        session.set_button_state(id, button.state.into())?;
        handles.buttons.push((button.id.clone(), id));
    }

    let mut sources = Vec::new();
    for node in &doc.nodes {
        let kind = node_kind(&node.id, &node.kind, &handles)?;
        let id = session.add_node(node.name.clone(), kind)?;
        if matches!(node.kind, NodeKindDef::PowerSource { enabled: true }) {
            sources.push(id);
        }
        handles.nodes.push((node.id.clone(), id));
    }

    for cable in &doc.cables {
        let id = session.add_cable(cable.mode);
        handles.cables.push((cable.id.clone(), id));
        for (side, end) in [(Side::A, &cable.a), (Side::B, &cable.b)] {
            let Some(end) = end else {
                continue;
            };
            let node = handles
                .node(&end.node)
                .ok_or_else(|| missing(&end.node, &format!("cable '{}'", cable.id)))?;
            for pole in &end.poles {
                session.attach_cable(node, end.contact, id, side, *pole)?;
            }
            for pole in &end.passthrough {
                session.set_passthrough(node, end.contact, *pole, true)?;
            }
        }
    }

    for source in sources {
        session.set_source_enabled(source, true)?;
    }
    Ok((session, handles))
}

fn deviator(swap: bool, flip: bool, central_connector: bool) -> Deviator {
    let mut d = Deviator::default();
    d.flip = flip;
    d.central_connector = central_connector;
    d.set_swap(swap);
    d
}

fn node_kind(node: &str, def: &NodeKindDef, handles: &PanelHandles) -> ProjectResult<NodeKind> {
    let relay = |key: &Option<String>| -> ProjectResult<Option<RelayId>> {
        key.as_deref()
            .map(|k| {
                handles
                    .relay(k)
                    .ok_or_else(|| ProjectError::from(missing(k, &format!("node '{node}' relay"))))
            })
            .transpose()
    };
    let kind = match def {
        // Enabled sources are switched on after wiring.
        NodeKindDef::PowerSource { .. } => NodeKind::PowerSource(PowerSource { enabled: false }),
        NodeKindDef::Switch { on } => NodeKind::Switch(OnOffSwitch { on: *on }),
        NodeKindDef::Junction { disabled_contact } => NodeKind::Junction(Junction {
            disabled_contact: *disabled_contact,
        }),
        NodeKindDef::RelayContact {
            relay: key,
            swap,
            flip,
            central_connector,
        } => {
            let mut rc = RelayContact::default();
            rc.relay = relay(key)?;
            rc.deviator = deviator(*swap, *flip, *central_connector);
            NodeKind::RelayContact(rc)
        }
        NodeKindDef::ButtonContact {
            button,
            swap,
            flip,
            central_connector,
            table,
        } => {
            let button = button
                .as_deref()
                .map(|k| {
                    handles
                        .button(k)
                        .ok_or_else(|| missing(k, &format!("node '{node}' button")))
                })
                .transpose()?;
            NodeKind::ButtonContact(ButtonContact {
                button,
                deviator: deviator(*swap, *flip, *central_connector),
                table: [table.up, table.down],
            })
        }
        NodeKindDef::RelayCoil {
            relay: key,
            relay_type,
            second_contact,
            delay_up_ms,
            delay_down_ms,
        } => NodeKind::RelayCoil(RelayCoil {
            relay: relay(key)?,
            coil_type: (*relay_type).into(),
            second_contact: *second_contact,
            delay_up_ms: *delay_up_ms,
            delay_down_ms: *delay_down_ms,
        }),
    };
    Ok(kind)
}

/// Describe the current state of a session as a document.
///
/// Objects not listed in `handles` (added after the build) get generated
/// keys. Source, switch, relay and button states are the live ones.
pub fn snapshot(name: &str, session: &Session, handles: &PanelHandles) -> PanelDoc {
    let mut doc = PanelDoc::new(name);
    doc.engine = session.config().clone();

    let mut handles = handles.clone();
    for (id, _) in session.relays() {
        if handles.relay_key(id).is_none() {
            handles.relays.push((format!("relay{id}"), id));
        }
    }
    for (id, _) in session.buttons() {
        if name_of(&handles.buttons, id).is_none() {
            handles.buttons.push((format!("button{id}"), id));
        }
    }
    for node in session.network().nodes() {
        if handles.node_key(node.id).is_none() {
            handles.nodes.push((format!("node{}", node.id), node.id));
        }
    }
    for cable in session.network().cables() {
        if name_of(&handles.cables, cable.id).is_none() {
            handles.cables.push((format!("cable{}", cable.id), cable.id));
        }
    }

    for (key, id) in &handles.relays {
        if let Some(relay) = session.relay(*id) {
            doc.relays.push(RelayDef {
                id: key.clone(),
                name: relay.name.clone(),
                normally_up: relay.normally_up,
            });
        }
    }
    for (key, id) in &handles.buttons {
        if let Some(button) = session.button(*id) {
            doc.buttons.push(ButtonDef {
                id: key.clone(),
                name: button.name.clone(),
                state: button.state.into(),
            });
        }
    }
    for (key, id) in &handles.nodes {
        if let Ok(node) = session.network().node(*id) {
            doc.nodes.push(NodeDef {
                id: key.clone(),
                name: node.name.clone(),
                kind: kind_def(&node.kind, &handles),
            });
        }
    }
    for (key, id) in &handles.cables {
        let Ok(cable) = session.network().cable(*id) else {
            continue;
        };
        let end = |side: Side| {
            let end = cable.get_node(side)?;
            let node = session.network().node(end.node).ok()?;
            Some(end_def(node, end.contact, &handles))
        };
        doc.cables.push(CableDef {
            id: key.clone(),
            mode: cable.mode,
            a: end(Side::A),
            b: end(Side::B),
        });
    }
    doc
}

fn end_def(node: &Node, contact: usize, handles: &PanelHandles) -> CableEndDef {
    let types = node
        .contact(contact)
        .map(|c| Pole::BOTH.map(|p| c.contact_type(p)))
        .unwrap_or_default();
    let poles_where = |pred: fn(ContactType) -> bool| {
        Pole::BOTH
            .into_iter()
            .zip(types)
            .filter(|(_, t)| pred(*t))
            .map(|(p, _)| p)
            .collect::<Vec<_>>()
    };
    CableEndDef {
        node: handles
            .node_key(node.id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.id)),
        contact,
        poles: poles_where(ContactType::is_connected),
        passthrough: poles_where(|t| t == ContactType::Passthrough),
    }
}

fn kind_def(kind: &NodeKind, handles: &PanelHandles) -> NodeKindDef {
    let relay_key = |id: Option<RelayId>| id.and_then(|r| handles.relay_key(r)).map(str::to_string);
    match kind {
        NodeKind::PowerSource(s) => NodeKindDef::PowerSource { enabled: s.enabled },
        NodeKind::Switch(s) => NodeKindDef::Switch { on: s.on },
        NodeKind::Junction(j) => NodeKindDef::Junction {
            disabled_contact: j.disabled_contact,
        },
        NodeKind::RelayContact(rc) => NodeKindDef::RelayContact {
            relay: relay_key(rc.relay),
            swap: rc.deviator.swap(),
            flip: rc.deviator.flip,
            central_connector: rc.deviator.central_connector,
        },
        NodeKind::ButtonContact(bc) => NodeKindDef::ButtonContact {
            button: bc
                .button
                .and_then(|b| name_of(&handles.buttons, b))
                .map(str::to_string),
            swap: bc.deviator.swap(),
            flip: bc.deviator.flip,
            central_connector: bc.deviator.central_connector,
            table: ButtonTableDef {
                up: bc.table[0],
                down: bc.table[1],
            },
        },
        NodeKind::RelayCoil(c) => NodeKindDef::RelayCoil {
            relay: relay_key(c.relay),
            relay_type: c.coil_type.into(),
            second_contact: c.second_contact,
            delay_up_ms: c.delay_up_ms,
            delay_down_ms: c.delay_down_ms,
        },
    }
}

impl From<ButtonStateDef> for ButtonState {
    fn from(def: ButtonStateDef) -> Self {
        match def {
            ButtonStateDef::Normal => ButtonState::Normal,
            ButtonStateDef::Pressed => ButtonState::Pressed,
            ButtonStateDef::Extracted => ButtonState::Extracted,
        }
    }
}

impl From<ButtonState> for ButtonStateDef {
    fn from(state: ButtonState) -> Self {
        match state {
            ButtonState::Normal => ButtonStateDef::Normal,
            ButtonState::Pressed => ButtonStateDef::Pressed,
            ButtonState::Extracted => ButtonStateDef::Extracted,
        }
    }
}

impl From<CoilTypeDef> for CoilType {
    fn from(def: CoilTypeDef) -> Self {
        match def {
            CoilTypeDef::Normal => CoilType::Normal,
            CoilTypeDef::Polarized => CoilType::Polarized,
            CoilTypeDef::PolarizedInverted => CoilType::PolarizedInverted,
        }
    }
}

impl From<CoilType> for CoilTypeDef {
    fn from(t: CoilType) -> Self {
        match t {
            CoilType::Normal => CoilTypeDef::Normal,
            CoilType::Polarized => CoilTypeDef::Polarized,
            CoilType::PolarizedInverted => CoilTypeDef::PolarizedInverted,
        }
    }
}
