use tabula_core::layout::{MAX_FIELD_ID, read_u32_le};
use tabula_core::{ScalarType, ScalarValue};

use super::*;
use crate::header::{has_identifier, size_prefix};
use crate::offset::StrRef;
use crate::record::{Record, Value};
use crate::table::{Table, root_table, size_prefixed_root_table};
use crate::test_utils::{add_server_info, protocol_schema, server_info_buffer};
use crate::vector::Vector;

#[test]
fn server_info_round_trip() {
    let buf = server_info_buffer(42, "lobby", 1);

    let root = root_table(&buf);
    assert_eq!(root.get::<i32>(0, 0), 42);
    assert_eq!(root.get_str(1), Some("lobby"));
    assert_eq!(root.get::<i32>(2, 0), 1);
    assert!(has_identifier(&buf, b"SSPT", false));
}

#[test]
fn server_info_layout() {
    let buf = server_info_buffer(42, "lobby", 1);

    // root offset, identifier, 2 bytes padding, 10-byte vtable, 16-byte
    // table, then the string padded to 4.
    assert_eq!(buf.len(), 48);
    assert_eq!(read_u32_le(&buf, 0), 20);
    assert_eq!(&buf[4..8], b"SSPT");
    assert_eq!(&buf[10..20], &[10, 0, 16, 0, 12, 0, 8, 0, 4, 0]);
    assert_eq!(&buf[20..24], &10i32.to_le_bytes());
    assert_eq!(&buf[36..46], b"\x05\x00\x00\x00lobby\x00");
}

#[test]
fn default_values_are_not_stored() {
    let mut b = Builder::new();
    b.start_object(2).unwrap();
    b.add_field::<i32>(0, 0, 0).unwrap();
    b.add_field::<i16>(1, 7, 7).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();
    let buf = b.finished_data().unwrap();

    let table = root_table(buf);
    assert_eq!(table.vtable().len(), 4);
    assert_eq!(table.vtable().table_len(), 4);
    assert_eq!(table.get::<i32>(0, 0), 0);
    assert_eq!(table.get::<i16>(1, 7), 7);
    assert_eq!(table.get_opt::<i32>(0), None);
}

#[test]
fn force_defaults_stores_them() {
    let mut b = Builder::with_options(BuilderOptions::new().force_defaults(true));
    b.start_object(1).unwrap();
    b.add_field::<i32>(0, 0, 0).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();

    let table = root_table(b.finished_data().unwrap());
    assert_eq!(table.get_opt::<i32>(0), Some(0));
}

#[test]
fn add_value_compares_encoded_defaults() {
    let mut b = Builder::new();
    b.start_object(2).unwrap();
    // UInt(5) and Int(5) encode the same way.
    b.add_value(0, ScalarType::U8, ScalarValue::Int(5), ScalarValue::UInt(5))
        .unwrap();
    b.add_value(1, ScalarType::F32, ScalarValue::Float(0.5), ScalarValue::Float(0.0))
        .unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();

    let table = root_table(b.finished_data().unwrap());
    assert_eq!(table.offset_of(0), None);
    assert_eq!(table.get::<f32>(1, 0.0), 0.5);
}

#[test]
fn unset_enum_reads_as_default() {
    let schema = protocol_schema();
    let id = schema.find_table("Reply_LoginFailed").unwrap();

    let mut b = Builder::new();
    b.start_object(schema.table(id).field_count()).unwrap();
    b.add_field::<u16>(1, 45, 30).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();
    let buf = b.finished_data().unwrap();

    let table = root_table(buf);
    assert_eq!(table.vtable().get(0), 0);

    let record = Record::new(table, &schema, id);
    let Value::Enum { value, name } = record.get("error_code").unwrap() else {
        panic!("error_code is an enum field");
    };
    assert_eq!(value.as_i64(), 0);
    assert_eq!(name, Some("OK"));
    assert_eq!(record.get_scalar("retry_after").unwrap().as_u64(), 45);
}

fn server_list(options: BuilderOptions) -> Builder {
    let mut b = Builder::with_options(options);
    let first = add_server_info(&mut b, 1, "a", 1);
    let second = add_server_info(&mut b, 2, "b", 2);
    let list = b.create_vector_of_offsets(&[first, second]).unwrap();
    b.start_object(1).unwrap();
    b.add_offset(0, list).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();
    b
}

#[test]
fn same_shape_tables_share_a_vtable() {
    let b = server_list(BuilderOptions::new());

    let stats = b.vtable_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.bytes_saved, 10);

    let buf = b.finished_data().unwrap();
    let servers: Vector<'_, Table<'_>> = root_table(buf).get_vector(0).unwrap();
    assert_eq!(servers.len(), 2);
    let (a, b) = (servers.get(0), servers.get(1));
    assert_ne!(a.loc(), b.loc());
    assert_eq!(a.vtable().loc(), b.vtable().loc());
    assert_eq!(b.get_str(1), Some("b"));

    // "a" (padded to 8), a table, the one ServerInfo vtable, "b", a table,
    // the vector, the root table and its vtable, padding, the root offset.
    assert_eq!(buf.len(), 8 + 16 + 10 + 6 + 16 + 12 + 8 + 6 + 2 + 4);
    assert_eq!(buf.len(), 88);
}

#[test]
fn dedup_can_be_disabled() {
    let shared = server_list(BuilderOptions::new());
    let b = server_list(BuilderOptions::new().dedup_vtables(false));

    assert_eq!(b.vtable_stats().hits, 0);
    let buf = b.finished_data().unwrap();
    let servers: Vector<'_, Table<'_>> = root_table(buf).get_vector(0).unwrap();
    assert_ne!(servers.get(0).vtable().loc(), servers.get(1).vtable().loc());

    // The second vtable costs its 10 bytes plus 2 bytes of realignment.
    let saved = shared.vtable_stats().bytes_saved;
    assert_eq!(buf.len(), shared.finished_data().unwrap().len() + saved + 2);
}

#[test]
fn fields_are_packed_widest_first() {
    let mut b = Builder::new();
    b.start_object(3).unwrap();
    b.add_field::<u8>(0, 1, 0).unwrap();
    b.add_field::<f64>(1, 2.5, 0.0).unwrap();
    b.add_field::<u16>(2, 3, 0).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();
    let buf = b.finished_data().unwrap();

    let table = root_table(buf);
    // soffset + 8 + 2 + 1, padded to 4.
    assert_eq!(table.vtable().table_len(), 16);
    assert_eq!(buf.len() % 8, 0);
    assert_eq!((table.loc() + table.offset_of(1).unwrap() as usize) % 8, 0);
    assert_eq!(table.get::<u8>(0, 0), 1);
    assert_eq!(table.get::<f64>(1, 0.0), 2.5);
    assert_eq!(table.get::<u16>(2, 0), 3);
}

#[test]
fn child_built_while_parent_open() {
    let mut b = Builder::new();
    b.start_object(2).unwrap();
    b.add_field::<u32>(0, 9, 0).unwrap();

    b.start_object(1).unwrap();
    b.add_field::<i64>(0, -5, 0).unwrap();
    let child = b.end_object().unwrap();
    assert_eq!(b.depth(), 1);

    b.add_offset(1, child).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();

    let table = root_table(b.finished_data().unwrap());
    assert_eq!(table.get::<u32>(0, 0), 9);
    assert_eq!(table.get_table(1).unwrap().get::<i64>(0, 0), -5);
}

#[test]
fn vectors_round_trip() {
    let mut b = Builder::new();
    let numbers = b.create_vector::<u16>(&[1, 2, 3]).unwrap();
    let names = b.create_vector_of_strings(&["x", "yz"]).unwrap();
    let empty = b.create_vector::<f64>(&[]).unwrap();
    b.start_object(3).unwrap();
    b.add_offset(0, numbers).unwrap();
    b.add_offset(1, names).unwrap();
    b.add_offset(2, empty).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();

    let table = root_table(b.finished_data().unwrap());
    let numbers: Vector<'_, u16> = table.get_vector(0).unwrap();
    assert_eq!(numbers.iter().collect::<Vec<_>>(), [1, 2, 3]);
    assert_eq!(numbers.bytes(), &[1, 0, 2, 0, 3, 0]);
    let names: Vector<'_, &str> = table.get_vector(1).unwrap();
    assert_eq!(names.iter().collect::<Vec<_>>(), ["x", "yz"]);
    let empty: Vector<'_, f64> = table.get_vector(2).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn shared_strings_are_written_once() {
    let mut b = Builder::new();
    let first = b.create_shared_string("lobby").unwrap();
    let len = b.len();
    let second = b.create_shared_string("lobby").unwrap();
    assert_eq!(first, second);
    assert_eq!(b.len(), len);

    let other = b.create_string("lobby").unwrap();
    assert_ne!(first, other);
}

#[test]
fn size_prefixed_buffer() {
    let mut b = Builder::new();
    let root = add_server_info(&mut b, 42, "lobby", 1);
    b.finish_size_prefixed(root, None).unwrap();
    let buf = b.finished_data().unwrap();

    assert_eq!(size_prefix(buf), Some(buf.len() as u32 - 4));
    let table = size_prefixed_root_table(buf);
    assert_eq!(table.get::<i32>(0, 0), 42);
    assert_eq!(table.get_str(1), Some("lobby"));
}

#[test]
fn reset_reproduces_identical_bytes() {
    let mut b = Builder::with_capacity(1);
    let root = add_server_info(&mut b, 42, "lobby", 1);
    b.finish(root, Some(b"SSPT")).unwrap();
    let first = b.finished_data().unwrap().to_vec();

    b.reset();
    assert!(b.is_empty());
    assert!(!b.is_finished());
    let root = add_server_info(&mut b, 42, "lobby", 1);
    b.finish(root, Some(b"SSPT")).unwrap();

    assert_eq!(b.finished_data().unwrap(), &first[..]);
    assert_eq!(first, server_info_buffer(42, "lobby", 1));
}

#[test]
fn field_without_object() {
    let mut b = Builder::new();
    assert_eq!(b.add_field::<i32>(0, 1, 0), Err(BuildError::NoOpenObject));
    assert_eq!(b.end_object(), Err(BuildError::NoOpenObject));
}

#[test]
fn field_id_out_of_range() {
    let mut b = Builder::new();
    b.start_object(2).unwrap();
    assert_eq!(
        b.add_field::<i32>(2, 1, 0),
        Err(BuildError::FieldOutOfRange {
            id: 2,
            field_count: 2
        })
    );
}

#[test]
fn field_added_twice() {
    let mut b = Builder::new();
    b.start_object(1).unwrap();
    b.add_field::<i32>(0, 1, 0).unwrap();
    assert_eq!(b.add_field::<i32>(0, 2, 0), Err(BuildError::DuplicateField(0)));
}

#[test]
fn too_many_fields() {
    let mut b = Builder::new();
    assert_eq!(
        b.start_object(MAX_FIELD_ID + 2),
        Err(BuildError::TooManyFields(MAX_FIELD_ID + 2))
    );
    b.start_object(MAX_FIELD_ID + 1).unwrap();
}

#[test]
fn nesting_is_bounded() {
    let mut b = Builder::with_options(BuilderOptions::new().max_depth(2));
    b.start_object(0).unwrap();
    b.start_object(0).unwrap();
    assert_eq!(
        b.start_object(0),
        Err(BuildError::DepthExceeded { limit: 2 })
    );
}

#[test]
fn finish_with_open_object() {
    let mut b = Builder::new();
    b.start_object(0).unwrap();
    let root = b.end_object().unwrap();
    b.start_object(0).unwrap();
    assert_eq!(
        b.finish(root, None),
        Err(BuildError::UnclosedObjects { open: 1 })
    );
}

#[test]
fn invalid_offsets() {
    let mut b = Builder::new();
    b.start_object(1).unwrap();
    assert_eq!(
        b.add_offset(0, Offset::<StrRef>::new(0)),
        Err(BuildError::InvalidOffset(0))
    );
    assert_eq!(
        b.add_offset(0, Offset::<StrRef>::new(999)),
        Err(BuildError::InvalidOffset(999))
    );
}

#[test]
fn finished_builder_rejects_writes() {
    let mut b = Builder::new();
    assert_eq!(b.finished_data(), Err(BuildError::NotFinished));

    b.start_object(0).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();

    assert_eq!(b.create_string("late"), Err(BuildError::Finished));
    assert_eq!(b.start_object(0), Err(BuildError::Finished));
    assert_eq!(b.finish(root, None), Err(BuildError::Finished));
}

#[test]
fn empty_table() {
    let mut b = Builder::new();
    b.start_object(0).unwrap();
    let root = b.end_object().unwrap();
    b.finish(root, None).unwrap();
    let buf = b.into_vec().unwrap();

    // root offset, 4-byte table, 4-byte vtable.
    assert_eq!(buf.len(), 12);
    let table = root_table(&buf);
    assert_eq!(table.vtable().len(), 4);
    assert_eq!(table.vtable().table_len(), 4);
    assert_eq!(table.get::<i32>(0, -1), -1);
}

#[test]
fn options_from_json() {
    let options: BuilderOptions =
        serde_json::from_str(r#"{ "max_depth": 8, "dedup_vtables": false }"#).unwrap();
    assert_eq!(options.max_depth, 8);
    assert!(!options.dedup_vtables);
    assert_eq!(options.initial_capacity, BuilderOptions::default().initial_capacity);

    let err = serde_json::from_str::<BuilderOptions>(r#"{ "depth": 8 }"#);
    assert!(err.is_err());
}

#[test]
fn error_messages() {
    insta::assert_snapshot!(
        BuildError::FieldOutOfRange { id: 4, field_count: 3 },
        @"field id 4 is outside the 3 fields declared for this object"
    );
    insta::assert_snapshot!(
        BuildError::TooManyFields(40000),
        @"an object can declare at most 32765 fields, got 40000"
    );
}
