use super::*;
use pretty_assertions::assert_eq;

fn request<'a>(
    opcode: Opcode,
    name: &str,
    texts: &[&str],
    arguments: Vec<Value>,
    flags: &'a CommandData,
) -> ConstructRequest<'a> {
    ConstructRequest {
        opcode,
        kind: ObjectKind::from_opcode(opcode).unwrap_or(ObjectKind::DataSet),
        name: name.to_string(),
        operation: None,
        texts: texts.iter().map(|t| (*t).to_string()).collect(),
        arguments,
        flags,
        source: "declaration",
    }
}

fn data_set(objects: &mut ObjectStore, name: &str) {
    let flags = CommandData::DataSet { from_string: true };
    RecordingPayload
        .construct(
            request(Opcode::DataSet, name, &["\"ACGT\""], vec![Value::from("ACGT")], &flags),
            objects,
        )
        .unwrap();
}

#[test]
fn test_kind_names_round_trip() {
    for kind in ObjectKind::ALL {
        assert_eq!(ObjectKind::from_name(kind.name()), Some(kind));
    }
    assert_eq!(ObjectKind::from_name("Widget"), None);
    assert_eq!(ObjectKind::from_opcode(Opcode::Scfg), Some(ObjectKind::Scfg));
    assert_eq!(ObjectKind::from_opcode(Opcode::Fprintf), None);
}

#[test]
fn test_redeclaration_keeps_position() {
    let mut objects = ObjectStore::new();
    data_set(&mut objects, "a");
    data_set(&mut objects, "b");
    data_set(&mut objects, "a");
    assert_eq!(objects.names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(objects.nth_of_kind(ObjectKind::DataSet, 1).map(|r| r.name.as_str()), Some("b"));
    assert_eq!(objects.count_of_kind(ObjectKind::Tree), 0);
}

#[test]
fn test_filter_requires_data_set() {
    let mut objects = ObjectStore::new();
    let flags = CommandData::None;
    let err = RecordingPayload
        .construct(
            request(Opcode::DataSetFilter, "f", &["ds"], vec![Value::Undefined], &flags),
            &mut objects,
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Could not find source DataSet 'ds'");

    data_set(&mut objects, "ds");
    RecordingPayload
        .construct(
            request(Opcode::DataSetFilter, "f", &["ds"], vec![Value::from("ds")], &flags),
            &mut objects,
        )
        .unwrap();
    assert_eq!(objects.get("f").map(|r| r.kind), Some(ObjectKind::DataSetFilter));
}

#[test]
fn test_purging_merge_removes_sources() {
    let mut objects = ObjectStore::new();
    data_set(&mut objects, "a");
    data_set(&mut objects, "b");
    let flags = CommandData::Merge {
        mode: hbl_ir::MergeMode::Concatenate,
        purge: true,
    };
    RecordingPayload
        .construct(
            request(
                Opcode::DataSetMerge,
                "joined",
                &["a", "b"],
                vec![Value::from("a"), Value::from("b")],
                &flags,
            ),
            &mut objects,
        )
        .unwrap();
    assert_eq!(objects.names().collect::<Vec<_>>(), vec!["joined"]);
}

#[test]
fn test_operations_are_unsupported() {
    let mut objects = ObjectStore::new();
    let err = RecordingPayload
        .operation(Opcode::Optimize, &["res".into(), "lf".into()], &mut objects)
        .unwrap_err();
    assert_eq!(err, PayloadError::Unsupported("Optimize"));
}
