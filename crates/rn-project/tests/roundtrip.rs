use rn_core::{CableMode, CircuitKind, Pole};
use rn_graph::RelayState;
use rn_project::schema::*;
use rn_project::{
    build_session, load, load_json, load_yaml, save, save_json, save_yaml, snapshot, validate_panel,
    ProjectError, ValidationError,
};

fn node(id: &str, kind: NodeKindDef) -> NodeDef {
    NodeDef {
        id: id.to_string(),
        name: id.to_uppercase(),
        kind,
    }
}

fn end(node: &str, contact: usize) -> Option<CableEndDef> {
    Some(CableEndDef {
        node: node.to_string(),
        contact,
        poles: Pole::BOTH.to_vec(),
        passthrough: vec![],
    })
}

fn cable(id: &str, a: Option<CableEndDef>, b: Option<CableEndDef>) -> CableDef {
    CableDef {
        id: id.to_string(),
        mode: CableMode::BifilarBoth,
        a,
        b,
    }
}

fn coil_loop() -> PanelDoc {
    let mut doc = PanelDoc::new("Coil loop");
    doc.relays.push(RelayDef {
        id: "r1".to_string(),
        name: "R1".to_string(),
        normally_up: false,
    });
    doc.nodes = vec![
        node("b1", NodeKindDef::PowerSource { enabled: true }),
        node("s1", NodeKindDef::Switch { on: true }),
        node(
            "c1",
            NodeKindDef::RelayCoil {
                relay: Some("r1".to_string()),
                relay_type: CoilTypeDef::Normal,
                second_contact: false,
                delay_up_ms: 0,
                delay_down_ms: 0,
            },
        ),
    ];
    doc.cables = vec![
        cable("k1", end("b1", 0), end("s1", 0)),
        cable("k2", end("s1", 1), end("c1", 0)),
    ];
    doc
}

#[test]
fn roundtrip_yaml_empty_panel() {
    let doc = PanelDoc::new("Empty");
    validate_panel(&doc).unwrap();

    let path = std::env::temp_dir().join("rn_project_roundtrip_empty.yaml");
    save_yaml(&path, &doc).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(doc, loaded);
}

#[test]
fn roundtrip_yaml_coil_loop() {
    let doc = coil_loop();
    let path = std::env::temp_dir().join("rn_project_roundtrip_coil_loop.yaml");
    save_yaml(&path, &doc).unwrap();
    assert_eq!(doc, load_yaml(&path).unwrap());
}

#[test]
fn roundtrip_json_coil_loop() {
    let doc = coil_loop();
    let path = std::env::temp_dir().join("rn_project_roundtrip_coil_loop.json");
    save_json(&path, &doc).unwrap();
    assert_eq!(doc, load_json(&path).unwrap());
}

#[test]
fn format_follows_the_extension() {
    let doc = coil_loop();
    let path = std::env::temp_dir().join("rn_project_dispatch.yml");
    save(&path, &doc).unwrap();
    assert_eq!(doc, load(&path).unwrap());

    let bad = std::env::temp_dir().join("rn_project_dispatch.toml");
    assert!(matches!(
        save(&bad, &doc),
        Err(ProjectError::UnsupportedFormat { .. })
    ));
}

#[test]
fn built_loop_pulls_its_relay_up() {
    let (mut session, handles) = build_session(&coil_loop()).unwrap();
    session.verify().unwrap();
    assert_eq!(session.circuits().count(CircuitKind::Closed), 1);
    let r1 = handles.relay("r1").unwrap();
    assert_eq!(session.relay(r1).unwrap().state(), RelayState::Up);

    let s1 = handles.node("s1").unwrap();
    session.set_switch_on(s1, false).unwrap();
    assert_eq!(session.relay(r1).unwrap().state(), RelayState::Down);
}

#[test]
fn snapshot_reflects_live_state() {
    let doc = coil_loop();
    let (mut session, handles) = build_session(&doc).unwrap();
    assert_eq!(snapshot(&doc.name, &session, &handles), doc);

    let s1 = handles.node("s1").unwrap();
    session.set_switch_on(s1, false).unwrap();
    let snap = snapshot(&doc.name, &session, &handles);
    assert_eq!(snap.nodes[1].kind, NodeKindDef::Switch { on: false });
    assert_eq!(snap.cables, doc.cables);
}

#[test]
fn disabled_source_builds_idle() {
    let mut doc = coil_loop();
    doc.nodes[0].kind = NodeKindDef::PowerSource { enabled: false };
    let (session, _) = build_session(&doc).unwrap();
    assert!(session.circuits().is_empty());
    assert!(session.network().is_idle());
}

#[test]
fn single_pole_end_leaves_the_loop_open() {
    let mut doc = coil_loop();
    if let Some(end) = doc.cables[1].b.as_mut() {
        end.poles = vec![Pole::First];
    }
    let (session, handles) = build_session(&doc).unwrap();
    session.verify().unwrap();
    assert_eq!(session.circuits().count(CircuitKind::Closed), 0);
    let r1 = handles.relay("r1").unwrap();
    assert_eq!(session.relay(r1).unwrap().state(), RelayState::Down);
}

fn assert_invalid(doc: &PanelDoc) {
    match validate_panel(doc) {
        Err(ValidationError::InvalidValue { .. }) => {}
        other => panic!("expected an invalid value, got {other:?}"),
    }
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut doc = coil_loop();
    doc.nodes.push(node("s1", NodeKindDef::Switch { on: false }));
    assert!(matches!(
        validate_panel(&doc),
        Err(ValidationError::DuplicateId { .. })
    ));
}

#[test]
fn dangling_references_are_rejected() {
    let mut doc = coil_loop();
    doc.relays.clear();
    assert!(matches!(
        validate_panel(&doc),
        Err(ValidationError::MissingReference { .. })
    ));

    let mut doc = coil_loop();
    doc.cables.push(cable("k3", end("nowhere", 0), None));
    assert!(matches!(
        validate_panel(&doc),
        Err(ValidationError::MissingReference { .. })
    ));
}

#[test]
fn newer_versions_are_rejected() {
    let mut doc = coil_loop();
    doc.version = LATEST_VERSION + 1;
    assert!(matches!(
        validate_panel(&doc),
        Err(ValidationError::UnsupportedVersion { .. })
    ));
}

#[test]
fn bad_wiring_is_rejected() {
    // Out of range contact.
    let mut doc = coil_loop();
    doc.cables[0].b = end("s1", 2);
    assert_invalid(&doc);

    // Second coil contact without `second_contact`.
    let mut doc = coil_loop();
    doc.cables.push(cable("k3", end("c1", 1), None));
    assert_invalid(&doc);

    // Contact bound by two cable ends.
    let mut doc = coil_loop();
    doc.cables.push(cable("k3", end("s1", 0), None));
    assert_invalid(&doc);

    // Passthrough on a plain switch.
    let mut doc = coil_loop();
    if let Some(end) = doc.cables[0].b.as_mut() {
        end.passthrough = vec![Pole::First];
    }
    assert_invalid(&doc);

    // Junction contact 0 cannot be disabled.
    let mut doc = coil_loop();
    doc.nodes.push(node(
        "j1",
        NodeKindDef::Junction {
            disabled_contact: Some(0),
        },
    ));
    assert_invalid(&doc);
}

#[test]
fn invalid_panels_do_not_build() {
    let mut doc = coil_loop();
    doc.cables[1].a = end("s1", 0);
    assert!(matches!(
        build_session(&doc),
        Err(ProjectError::Validation(_))
    ));
}
