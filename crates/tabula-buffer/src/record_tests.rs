use tabula_core::{ScalarType, ScalarValue, Schema};

use super::*;
use crate::test_utils::{protocol_schema, server_info_buffer, server_info_schema};

fn login_message(schema: &Schema) -> Vec<u8> {
    let mut b = Builder::new();
    let login = RecordWriter::for_name(schema, "Request_Login")
        .unwrap()
        .write(
            &mut b,
            &[
                ("user_name", FieldInput::Str("neo")),
                ("password", FieldInput::Str("zion")),
            ],
        )
        .unwrap();
    let root = RecordWriter::for_name(schema, "MessageRoot")
        .unwrap()
        .write(
            &mut b,
            &[
                ("seq", FieldInput::Scalar(ScalarValue::UInt(7))),
                (
                    "message",
                    FieldInput::Union {
                        variant: "Request_Login",
                        value: login,
                    },
                ),
            ],
        )
        .unwrap();
    b.finish(root, Some(b"CSPT")).unwrap();
    b.into_vec().unwrap()
}

#[test]
fn read_by_name() {
    let buf = server_info_buffer(42, "lobby", 1);
    let schema = server_info_schema();
    let record = Record::root(&buf, &schema).unwrap();

    assert_eq!(record.name(), "ServerInfo");
    assert_eq!(record.get_scalar("session_id"), Some(ScalarValue::Int(42)));
    assert_eq!(record.get_str("name"), Some("lobby"));
    assert_eq!(record.get("type").unwrap().as_scalar(), Some(ScalarValue::Int(1)));
    assert_eq!(
        record.get("port").unwrap_err(),
        RecordError::UnknownField {
            table: "ServerInfo".into(),
            field: "port".into()
        }
    );
}

#[test]
fn union_round_trip() {
    let schema = protocol_schema();
    let buf = login_message(&schema);
    verify(&buf, &schema, &VerifierOptions::default()).unwrap();

    let root = Record::root(&buf, &schema).unwrap();
    let names: Vec<_> = root.fields().map(|(f, _)| f.name.as_str()).collect();
    assert_eq!(names, ["seq", "message"]);
    assert_eq!(root.get_scalar("seq").unwrap().as_u64(), 7);
    assert_eq!(root.get_scalar("message_type").unwrap().as_u64(), 1);

    let Value::Union(message) = root.get("message").unwrap() else {
        panic!("message is a union");
    };
    assert_eq!(message.tag, 1);
    assert_eq!(message.variant, Some("Request_Login"));
    let login = message.record.unwrap();
    assert_eq!(login.name(), "Request_Login");
    assert_eq!(login.get_str("user_name"), Some("neo"));
    assert_eq!(login.get_str("password"), Some("zion"));
}

#[test]
fn enum_by_name() {
    let schema = protocol_schema();
    let mut b = Builder::new();
    let root = RecordWriter::for_name(&schema, "Reply_LoginFailed")
        .unwrap()
        .write(&mut b, &[("error_code", FieldInput::Enum("LOGIN_DUPLICATION"))])
        .unwrap();
    b.finish(root, None).unwrap();
    let buf = b.finished_data().unwrap();

    let id = schema.find_table("Reply_LoginFailed").unwrap();
    let record = Record::new(root_table(buf), &schema, id);
    let value = record.get("error_code").unwrap();
    assert_eq!(value.as_str(), Some("LOGIN_DUPLICATION"));
    assert_eq!(value.as_scalar().unwrap().as_i64(), 10);
    // Absent, so the declared default.
    assert_eq!(record.get_scalar("retry_after").unwrap().as_u64(), 30);
}

#[test]
fn unknown_enum_value_reads_without_name() {
    let schema = protocol_schema();
    let mut b = Builder::new();
    let root = RecordWriter::for_name(&schema, "Reply_LoginFailed")
        .unwrap()
        .write(&mut b, &[("error_code", FieldInput::Scalar(ScalarValue::Int(99)))])
        .unwrap();
    b.finish(root, None).unwrap();

    let id = schema.find_table("Reply_LoginFailed").unwrap();
    let record = Record::new(root_table(b.finished_data().unwrap()), &schema, id);
    let Value::Enum { value, name } = record.get("error_code").unwrap() else {
        panic!("error_code is an enum field");
    };
    assert_eq!(value.as_i64(), 99);
    assert_eq!(name, None);
}

#[test]
fn vectors_through_the_writer() {
    let schema = protocol_schema();
    let info = RecordWriter::for_name(&schema, "ServerInfo").unwrap();
    let mut b = Builder::new();
    let servers = ["alpha", "beta"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            info.write(
                &mut b,
                &[
                    ("session_id", FieldInput::Scalar(ScalarValue::Int(i as i64 + 1))),
                    ("name", FieldInput::Str(name)),
                ],
            )
        })
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let root = RecordWriter::for_name(&schema, "Notify_ServerList")
        .unwrap()
        .write(
            &mut b,
            &[
                ("server_list", FieldInput::Tables(servers)),
                ("tags", FieldInput::Strings(vec!["eu", "pvp"])),
                (
                    "loads",
                    FieldInput::Scalars(vec![ScalarValue::UInt(3), ScalarValue::Int(250)]),
                ),
            ],
        )
        .unwrap();
    b.finish(root, Some(b"CSPT")).unwrap();
    let buf = b.into_vec().unwrap();

    let id = schema.find_table("Notify_ServerList").unwrap();
    verify_as(&buf, &schema, id, &VerifierOptions::default()).unwrap();
    let record = Record::new(root_table(&buf), &schema, id);

    let list = record.get("server_list").unwrap();
    let names: Vec<_> = list
        .as_vector()
        .unwrap()
        .iter()
        .map(|v| v.as_record().unwrap().get_str("name").unwrap())
        .collect();
    assert_eq!(names, ["alpha", "beta"]);

    let tags: Vec<_> = record
        .get("tags")
        .unwrap()
        .as_vector()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(tags, ["eu", "pvp"]);

    let loads: Vec<_> = record
        .get("loads")
        .unwrap()
        .as_vector()
        .unwrap()
        .iter()
        .map(|v| v.as_scalar().unwrap().as_u64())
        .collect();
    assert_eq!(loads, [3, 250]);

    assert!(record.get("primary").unwrap().is_absent());
}

#[test]
fn writer_rejects_bad_input() {
    let schema = protocol_schema();
    let mut b = Builder::new();
    let failed = RecordWriter::for_name(&schema, "Reply_LoginFailed").unwrap();

    let err = failed
        .write(&mut b, &[("retry_after", FieldInput::Scalar(ScalarValue::Int(-1)))])
        .unwrap_err();
    assert_eq!(
        err,
        RecordError::OutOfRange {
            table: "Reply_LoginFailed".into(),
            field: "retry_after".into(),
            value: "-1".into(),
            ty: ScalarType::U16,
        }
    );

    let err = failed
        .write(&mut b, &[("retry_after", FieldInput::Str("soon"))])
        .unwrap_err();
    insta::assert_snapshot!(err, @"Reply_LoginFailed.retry_after is a ushort field");

    let err = failed
        .write(&mut b, &[("error_code", FieldInput::Enum("TEAPOT"))])
        .unwrap_err();
    insta::assert_snapshot!(err, @"Reply_LoginFailed.error_code: `TEAPOT` is not a known enum value");

    let err = RecordWriter::for_name(&schema, "Request_Login")
        .unwrap()
        .write(&mut b, &[("password", FieldInput::Str("x"))])
        .unwrap_err();
    assert_eq!(
        err,
        RecordError::MissingRequired {
            table: "Request_Login".into(),
            field: "user_name".into()
        }
    );

    assert_eq!(
        RecordWriter::for_name(&schema, "Nope").unwrap_err(),
        RecordError::UnknownTable("Nope".into())
    );
}

#[test]
fn writer_rejects_unknown_variant() {
    let schema = protocol_schema();
    let mut b = Builder::new();
    b.start_object(0).unwrap();
    let value = b.end_object().unwrap();

    let err = RecordWriter::for_name(&schema, "MessageRoot")
        .unwrap()
        .write(
            &mut b,
            &[(
                "message",
                FieldInput::Union {
                    variant: "Reply_Teapot",
                    value,
                },
            )],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RecordError::UnknownName {
            kind: "union variant",
            ..
        }
    ));
}

#[test]
fn writer_rejects_deprecated_fields() {
    let schema = Schema::from_json(
        r#"{
            "tables": [{
                "name": "T",
                "fields": [
                    { "name": "old", "type": "int", "deprecated": true },
                    { "name": "new", "type": "int" }
                ]
            }]
        }"#,
    )
    .unwrap();
    let mut b = Builder::new();

    let err = RecordWriter::for_name(&schema, "T")
        .unwrap()
        .write(&mut b, &[("old", FieldInput::Scalar(ScalarValue::Int(1)))])
        .unwrap_err();
    assert_eq!(
        err,
        RecordError::Deprecated {
            table: "T".into(),
            field: "old".into()
        }
    );
}

#[test]
fn builder_errors_pass_through() {
    let schema = server_info_schema();
    let mut b = Builder::new();
    b.start_object(0).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();

    let err = RecordWriter::for_name(&schema, "ServerInfo")
        .unwrap()
        .write(&mut b, &[])
        .unwrap_err();
    assert_eq!(err, RecordError::Build(BuildError::Finished));
}

#[test]
fn set_by_name() {
    let schema = server_info_schema();
    let id = schema.root_table().unwrap();
    let mut buf = server_info_buffer(42, "lobby", 1);

    let mut record = RecordMut::new(root_table_mut(&mut buf), &schema, id);
    assert_eq!(record.set("session_id", ScalarValue::Int(-3)), Ok(true));
    assert!(matches!(
        record.set("session_id", ScalarValue::Int(1 << 40)),
        Err(RecordError::OutOfRange { .. })
    ));
    assert!(matches!(
        record.set("name", ScalarValue::Int(1)),
        Err(RecordError::TypeMismatch { .. })
    ));

    let record = Record::root(&buf, &schema).unwrap();
    assert_eq!(record.get_scalar("session_id"), Some(ScalarValue::Int(-3)));
    assert_eq!(record.get_str("name"), Some("lobby"));
}

#[test]
fn set_absent_field_is_refused() {
    let schema = protocol_schema();
    let mut b = Builder::new();
    let root = RecordWriter::for_name(&schema, "Reply_LoginFailed")
        .unwrap()
        .write(&mut b, &[("error_code", FieldInput::Enum("INVALID_STRING"))])
        .unwrap();
    b.finish(root, None).unwrap();
    let mut buf = b.into_vec().unwrap();
    let before = buf.clone();

    let id = schema.find_table("Reply_LoginFailed").unwrap();
    let mut record = RecordMut::new(root_table_mut(&mut buf), &schema, id);
    assert_eq!(record.set("retry_after", ScalarValue::UInt(5)), Ok(false));
    assert_eq!(buf, before);
}

#[test]
fn set_in_nested_table() {
    let schema = protocol_schema();
    let info = RecordWriter::for_name(&schema, "ServerInfo").unwrap();
    let mut b = Builder::new();
    let primary = info
        .write(&mut b, &[("type", FieldInput::Scalar(ScalarValue::Int(2)))])
        .unwrap();
    let root = RecordWriter::for_name(&schema, "Notify_ServerList")
        .unwrap()
        .write(&mut b, &[("primary", FieldInput::Table(primary))])
        .unwrap();
    b.finish(root, Some(b"CSPT")).unwrap();
    let mut buf = b.into_vec().unwrap();

    let id = schema.find_table("Notify_ServerList").unwrap();
    let mut record = RecordMut::new(root_table_mut(&mut buf), &schema, id);
    let mut primary = record.child("primary").unwrap().unwrap();
    assert_eq!(primary.set("type", ScalarValue::Int(5)), Ok(true));

    let record = Record::new(root_table(&buf), &schema, id);
    let primary = record.get("primary").unwrap().as_record().unwrap();
    assert_eq!(primary.get_scalar("type"), Some(ScalarValue::Int(5)));
}

#[test]
fn root_needs_root_type() {
    let schema = Schema::from_json(r#"{ "tables": [{ "name": "T" }] }"#).unwrap();
    assert_eq!(
        Record::root(&[0; 8], &schema).unwrap_err(),
        RecordError::NoRootType
    );
}
