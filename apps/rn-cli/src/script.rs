//! Scripted operator actions for `rn-cli simulate`.

use rn_circuit::{PassReport, Session};
use rn_core::Pole;
use rn_graph::RelayState;
use rn_project::{ButtonStateDef, PanelHandles, ProjectResult, ValidationError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    EnableSource {
        node: String,
    },
    DisableSource {
        node: String,
    },
    SetSwitch {
        node: String,
        on: bool,
    },
    PressButton {
        button: String,
        #[serde(default = "pressed")]
        state: ButtonStateDef,
    },
    SetRelay {
        relay: String,
        up: bool,
    },
    AdvanceMs {
        ms: u64,
    },
    Detach {
        node: String,
        contact: usize,
        pole: Pole,
    },
    RescanAll,
}

fn pressed() -> ButtonStateDef {
    ButtonStateDef::Pressed
}

pub fn parse(content: &str) -> ProjectResult<Vec<Action>> {
    Ok(serde_yaml::from_str(content)?)
}

fn unknown(id: &str) -> ValidationError {
    ValidationError::MissingReference {
        id: id.to_string(),
        context: "script".to_string(),
    }
}

pub fn apply(session: &mut Session, handles: &PanelHandles, action: &Action) -> ProjectResult<PassReport> {
    let node = |key: &str| handles.node(key).ok_or_else(|| unknown(key));
    let report = match action {
        Action::EnableSource { node: key } => session.set_source_enabled(node(key)?, true)?,
        Action::DisableSource { node: key } => session.set_source_enabled(node(key)?, false)?,
        Action::SetSwitch { node: key, on } => session.set_switch_on(node(key)?, *on)?,
        Action::PressButton { button, state } => {
            let id = handles.button(button).ok_or_else(|| unknown(button))?;
            session.set_button_state(id, (*state).into())?
        }
        Action::SetRelay { relay, up } => {
            let id = handles.relay(relay).ok_or_else(|| unknown(relay))?;
            let state = if *up { RelayState::Up } else { RelayState::Down };
            session.set_relay_state(id, state)?
        }
        Action::AdvanceMs { ms } => session.advance(*ms)?,
        Action::Detach {
            node: key,
            contact,
            pole,
        } => session.detach_cable(node(key)?, *contact, *pole)?,
        Action::RescanAll => session.rescan_all()?,
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rn_project::{build_session, load_yaml};
    use std::path::Path;

    #[test]
    fn demo_script_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/scripts/press_and_release.yaml");
        let actions = parse(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(actions.len(), 4);
        assert_eq!(
            actions[0],
            Action::PressButton {
                button: "p1".to_string(),
                state: ButtonStateDef::Pressed,
            }
        );
        assert_eq!(actions[1], Action::AdvanceMs { ms: 60 });
    }

    #[test]
    fn script_drives_the_coil_loop() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/panels/coil_loop.yaml");
        let (mut session, handles) = build_session(&load_yaml(&path).unwrap()).unwrap();
        let actions = parse(
            "- action: set_switch\n  node: s1\n  on: false\n- action: disable_source\n  node: b1\n",
        )
        .unwrap();
        let report = apply(&mut session, &handles, &actions[0]).unwrap();
        assert!(report.truncated > 0 || report.deleted > 0);
        apply(&mut session, &handles, &actions[1]).unwrap();
        assert!(session.circuits().is_empty());

        let missing = Action::SetSwitch {
            node: "nope".to_string(),
            on: true,
        };
        assert!(apply(&mut session, &handles, &missing).is_err());
    }
}
