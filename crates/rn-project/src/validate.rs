//! Structural validation of panel documents.

use std::collections::{HashMap, HashSet};

use rn_core::Pole;

use crate::schema::{CableEndDef, NodeKindDef, PanelDoc, LATEST_VERSION};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn unique<'a>(
    ids: impl IntoIterator<Item = &'a String>,
    context: &str,
) -> Result<HashSet<&'a String>, ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId {
                id: id.clone(),
                context: context.to_string(),
            });
        }
    }
    Ok(seen)
}

pub fn validate_panel(doc: &PanelDoc) -> Result<(), ValidationError> {
    if doc.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: doc.version,
        });
    }
    if doc.engine.max_depth == 0 {
        return Err(ValidationError::InvalidValue {
            field: "engine.max_depth".to_string(),
            value: "0".to_string(),
            reason: "a walk must be allowed to leave its source".to_string(),
        });
    }

    let relay_ids = unique(doc.relays.iter().map(|r| &r.id), "relays")?;
    let button_ids = unique(doc.buttons.iter().map(|b| &b.id), "buttons")?;
    unique(doc.nodes.iter().map(|n| &n.id), "nodes")?;
    unique(doc.cables.iter().map(|c| &c.id), "cables")?;

    let mut kinds: HashMap<&String, &NodeKindDef> = HashMap::new();
    for node in &doc.nodes {
        validate_node_kind(&node.id, &node.kind, &relay_ids, &button_ids)?;
        kinds.insert(&node.id, &node.kind);
    }

    let mut bound: HashSet<(&String, usize)> = HashSet::new();
    for cable in &doc.cables {
        for (side, end) in [("a", &cable.a), ("b", &cable.b)] {
            let Some(end) = end else {
                continue;
            };
            let field = format!("cable '{}' end {side}", cable.id);
            let kind = kinds.get(&end.node).ok_or_else(|| ValidationError::MissingReference {
                id: end.node.clone(),
                context: field.clone(),
            })?;
            validate_end(&field, end, kind)?;
            if !bound.insert((&end.node, end.contact)) {
                return Err(ValidationError::InvalidValue {
                    field,
                    value: format!("{}.{}", end.node, end.contact),
                    reason: "contact is already bound to another cable end".to_string(),
                });
            }
        }
    }

    Ok(())
}

fn validate_node_kind(
    id: &str,
    kind: &NodeKindDef,
    relays: &HashSet<&String>,
    buttons: &HashSet<&String>,
) -> Result<(), ValidationError> {
    let missing = |what: &String, context: &str| ValidationError::MissingReference {
        id: what.clone(),
        context: format!("node '{id}' {context}"),
    };
    match kind {
        NodeKindDef::Junction {
            disabled_contact: Some(c),
        } if *c == 0 || *c >= 4 => Err(ValidationError::InvalidValue {
            field: format!("node '{id}' disabled_contact"),
            value: c.to_string(),
            reason: "only junction contacts 1..=3 can be disabled".to_string(),
        }),
        NodeKindDef::RelayContact { relay: Some(r), .. } | NodeKindDef::RelayCoil { relay: Some(r), .. }
            if !relays.contains(r) =>
        {
            Err(missing(r, "relay"))
        }
        NodeKindDef::ButtonContact { button: Some(b), .. } if !buttons.contains(b) => {
            Err(missing(b, "button"))
        }
        _ => Ok(()),
    }
}

fn validate_end(field: &str, end: &CableEndDef, kind: &NodeKindDef) -> Result<(), ValidationError> {
    let invalid = |value: String, reason: &str| ValidationError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    };
    if end.contact >= kind.contact_count() {
        return Err(invalid(
            end.contact.to_string(),
            "contact index out of range for the node kind",
        ));
    }
    if !kind.is_contact_usable(end.contact) {
        return Err(invalid(
            end.contact.to_string(),
            "contact is disabled by the node configuration",
        ));
    }
    if end.poles.is_empty() {
        return Err(invalid("[]".to_string(), "an end binds at least one pole"));
    }
    if end.poles.len() > 1 && end.poles[0] == end.poles[1] {
        return Err(invalid(format!("{:?}", end.poles), "pole listed twice"));
    }
    if end.poles.len() > Pole::BOTH.len() {
        return Err(invalid(format!("{:?}", end.poles), "too many poles"));
    }
    for pole in &end.passthrough {
        if !end.poles.contains(pole) {
            return Err(invalid(format!("{pole:?}"), "passthrough pole is not attached"));
        }
        if !kind.is_deviator() || end.contact == 1 {
            return Err(invalid(
                format!("{pole:?}"),
                "passthrough only applies to common/down contacts of relay and button contacts",
            ));
        }
    }
    Ok(())
}
