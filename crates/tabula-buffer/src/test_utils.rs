//! Shared fixtures for this crate's tests.

use indoc::indoc;
use tabula_core::Schema;

use crate::builder::Builder;
use crate::offset::{Offset, TableRef};

pub const SERVER_INFO: &str = indoc! {r#"
    {
        "namespace": "protocol.ss",
        "file_identifier": "SSPT",
        "root_type": "ServerInfo",
        "tables": [
            {
                "name": "ServerInfo",
                "fields": [
                    { "name": "session_id", "type": "int" },
                    { "name": "name", "type": "string" },
                    { "name": "type", "type": "int" }
                ]
            }
        ]
    }
"#};

/// A small protocol: a root wrapping a union, enums, vectors and nesting.
pub const PROTOCOL: &str = indoc! {r#"
    {
        "namespace": "protocol.cs",
        "file_identifier": "CSPT",
        "root_type": "MessageRoot",
        "enums": [
            {
                "name": "ErrorCode",
                "type": "short",
                "values": [
                    { "name": "OK" },
                    { "name": "INVALID_STRING" },
                    { "name": "LOGIN_DUPLICATION", "value": 10 }
                ]
            }
        ],
        "unions": [
            { "name": "MessageType", "variants": ["Request_Login", "Reply_LoginFailed", "Notify_ServerList"] }
        ],
        "tables": [
            {
                "name": "MessageRoot",
                "fields": [
                    { "name": "seq", "type": "uint" },
                    { "name": "message", "type": "MessageType", "required": true }
                ]
            },
            {
                "name": "Request_Login",
                "fields": [
                    { "name": "user_name", "type": "string", "required": true },
                    { "name": "password", "type": "string" }
                ]
            },
            {
                "name": "Reply_LoginFailed",
                "fields": [
                    { "name": "error_code", "type": "ErrorCode" },
                    { "name": "retry_after", "type": "ushort", "default": 30 }
                ]
            },
            {
                "name": "ServerInfo",
                "fields": [
                    { "name": "session_id", "type": "int" },
                    { "name": "name", "type": "string" },
                    { "name": "type", "type": "int" }
                ]
            },
            {
                "name": "Notify_ServerList",
                "fields": [
                    { "name": "server_list", "type": "[ServerInfo]" },
                    { "name": "tags", "type": "[string]" },
                    { "name": "loads", "type": "[ubyte]" },
                    { "name": "primary", "type": "ServerInfo" }
                ]
            }
        ]
    }
"#};

pub fn server_info_schema() -> Schema {
    Schema::from_json(SERVER_INFO).unwrap()
}

pub fn protocol_schema() -> Schema {
    Schema::from_json(PROTOCOL).unwrap()
}

/// ServerInfo { session_id: 0, name: 1, type: 2 } with every field written.
pub fn add_server_info(b: &mut Builder, session_id: i32, name: &str, ty: i32) -> Offset<TableRef> {
    let name = b.create_string(name).unwrap();
    b.start_object(3).unwrap();
    b.add_field::<i32>(0, session_id, 0).unwrap();
    b.add_offset(1, name).unwrap();
    b.add_field::<i32>(2, ty, 0).unwrap();
    b.end_object().unwrap()
}

/// A finished ServerInfo buffer carrying the `SSPT` identifier.
pub fn server_info_buffer(session_id: i32, name: &str, ty: i32) -> Vec<u8> {
    let mut b = Builder::new();
    let root = add_server_info(&mut b, session_id, name, ty);
    b.finish(root, Some(b"SSPT")).unwrap();
    b.into_vec().unwrap()
}
