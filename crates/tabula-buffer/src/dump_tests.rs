use super::*;
use crate::test_utils::{add_server_info, protocol_schema, server_info_buffer, server_info_schema};

#[test]
fn server_info() {
    let buf = server_info_buffer(42, "lobby", 1);
    let res = dump_root(&buf, &server_info_schema()).unwrap();

    insta::assert_snapshot!(res, @r#"
    buffer: 48 bytes, identifier "SSPT"
    ServerInfo @20 (16 bytes, vtable @10)
      session_id: int = 42
      name: string = "lobby"
      type: int = 1
    "#);
}

#[test]
fn union_with_enum_and_default() {
    let schema = protocol_schema();

    let mut b = Builder::new();
    b.start_object(2).unwrap();
    b.add_field::<i16>(0, 10, 0).unwrap();
    let failed = b.end_object().unwrap();
    b.start_object(3).unwrap();
    b.add_field::<u32>(0, 7, 0).unwrap();
    b.add_field::<u8>(1, 2, 0).unwrap();
    b.add_offset(2, failed).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, Some(b"CSPT")).unwrap();
    let buf = b.into_vec().unwrap();

    let res = dump_root(&buf, &schema).unwrap();
    insta::assert_snapshot!(res, @r#"
    buffer: 52 bytes, identifier "CSPT"
    MessageRoot @20 (18 bytes, vtable @10)
      seq: uint = 7
      message: MessageType = Reply_LoginFailed @44 (8 bytes, vtable @38)
        error_code: ErrorCode = LOGIN_DUPLICATION (10)
        retry_after: ushort = 30 (default)
    "#);
}

#[test]
fn vectors_and_absent_fields() {
    let schema = protocol_schema();
    let list_id = schema.find_table("Notify_ServerList").unwrap();

    let mut b = Builder::new();
    let first = add_server_info(&mut b, 1, "alpha", 2);
    let second = add_server_info(&mut b, 3, "beta", 4);
    let servers = b.create_vector_of_offsets(&[first, second]).unwrap();
    let tags = b.create_vector_of_strings(&["eu", "pvp"]).unwrap();
    let loads = b.create_vector::<u8>(&[10, 20]).unwrap();
    b.start_object(4).unwrap();
    b.add_offset(0, servers).unwrap();
    b.add_offset(1, tags).unwrap();
    b.add_offset(2, loads).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, Some(b"CSPT")).unwrap();
    let buf = b.into_vec().unwrap();

    let res = dump(&buf, &schema, list_id).unwrap();
    let lines: Vec<_> = res.lines().map(str::trim).collect();

    assert!(lines[1].starts_with("Notify_ServerList @"));
    assert_eq!(lines[2], "server_list: [ServerInfo] = 2 items");
    assert!(lines[3].starts_with("[0] ServerInfo @"));
    assert_eq!(lines[5], r#"name: string = "alpha""#);
    assert!(lines[7].starts_with("[1] ServerInfo @"));
    assert_eq!(lines[9], r#"name: string = "beta""#);
    assert_eq!(
        &lines[11..],
        [
            r#"tags: [string] = ["eu", "pvp"]"#,
            "loads: [ubyte] = [10, 20]",
            "primary: ServerInfo = none",
        ]
    );
}

#[test]
fn unknown_union_variant() {
    let schema = protocol_schema();

    let mut b = Builder::new();
    b.start_object(0).unwrap();
    let future = b.end_object().unwrap();
    b.start_object(3).unwrap();
    b.add_field::<u8>(1, 42, 0).unwrap();
    b.add_offset(2, future).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, Some(b"CSPT")).unwrap();
    let buf = b.into_vec().unwrap();

    let res = dump_root(&buf, &schema).unwrap();
    let fields: Vec<_> = res.lines().skip(2).collect();
    assert_eq!(
        fields,
        [
            "  seq: uint = 0 (default)",
            "  message: MessageType = unknown variant 42",
        ]
    );
}

#[test]
fn corrupt_buffer_is_not_dumped() {
    let mut buf = server_info_buffer(42, "lobby", 1);
    buf[40] = 0xFF;

    let err = dump_root(&buf, &server_info_schema()).unwrap_err();
    assert_eq!(err.kind, VerifyErrorKind::InvalidUtf8);
}
