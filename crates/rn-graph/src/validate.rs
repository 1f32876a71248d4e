//! Topology consistency checks.

use rn_core::Side;

use crate::cable::CableEnd;
use crate::contact::CableBinding;
use crate::error::{GraphError, GraphResult};
use crate::network::Network;

/// Check that contact bindings and cable ends agree in both directions.
pub fn validate_topology(net: &Network) -> GraphResult<()> {
    for node in net.nodes() {
        for (i, contact) in node.contacts().iter().enumerate() {
            let any_pole = contact.types.iter().any(|t| t.is_connected());
            match contact.binding() {
                None if any_pole => {
                    return Err(GraphError::Inconsistent {
                        what: format!("contact {i} of node {} has a pole but no cable", node.id),
                    });
                }
                None => {}
                Some(CableBinding { cable, side }) => {
                    if !any_pole {
                        return Err(GraphError::Inconsistent {
                            what: format!("contact {i} of node {} has a cable but no pole", node.id),
                        });
                    }
                    if !node.kind.is_contact_usable(i) {
                        return Err(GraphError::ContactDisabled {
                            node: node.id,
                            contact: i,
                        });
                    }
                    let end = net.cable(cable)?.get_node(side);
                    if end != Some(CableEnd { node: node.id, contact: i }) {
                        return Err(GraphError::Inconsistent {
                            what: format!("cable {cable} side {side:?} does not point back to node {}", node.id),
                        });
                    }
                }
            }
        }
    }

    for cable in net.cables() {
        for side in [Side::A, Side::B] {
            let Some(end) = cable.get_node(side) else {
                continue;
            };
            let node = net.node(end.node)?;
            let binding = node.contact(end.contact).and_then(|c| c.binding());
            if binding != Some(CableBinding { cable: cable.id, side }) {
                return Err(GraphError::Inconsistent {
                    what: format!("cable {} side {side:?} is not bound by node {}", cable.id, end.node),
                });
            }
        }
    }
    Ok(())
}
