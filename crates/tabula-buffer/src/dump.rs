//! Human-readable, schema-aware buffer dump for debugging and snapshots.
//!
//! The buffer is verified first; the dump never reads unchecked data.

use std::fmt::Write as _;

use tabula_core::{FieldType, Schema, TableId};

use crate::header::{file_identifier, format_identifier};
use crate::record::{Record, Value};
use crate::verifier::{VerifierOptions, VerifyError, verify_as};

/// Dump a buffer whose root is `table`.
pub fn dump(buf: &[u8], schema: &Schema, table: TableId) -> Result<String, VerifyError> {
    verify_as(buf, schema, table, &VerifierOptions::default())?;

    let mut out = String::new();
    write!(out, "buffer: {} bytes", buf.len()).unwrap();
    if schema.file_identifier.is_some()
        && let Some(ident) = file_identifier(buf, false)
    {
        write!(out, ", identifier \"{}\"", format_identifier(&ident)).unwrap();
    }
    out.push('\n');

    let root = Record::new(crate::table::root_table(buf), schema, table);
    dump_table(&mut out, root, 0);
    Ok(out)
}

/// Dump a buffer whose root is the schema's root type.
pub fn dump_root(buf: &[u8], schema: &Schema) -> Result<String, VerifyError> {
    match schema.root_table() {
        Some(root) => dump(buf, schema, root),
        // The verifier reports the missing root type.
        None => crate::verifier::verify(buf, schema, &VerifierOptions::default()).map(|()| String::new()),
    }
}

fn dump_table(out: &mut String, record: Record<'_>, indent: usize) {
    let table = record.table();
    let vtable = table.vtable();
    writeln!(
        out,
        "{} @{} ({} bytes, vtable @{})",
        record.name(),
        table.loc(),
        vtable.table_len(),
        vtable.loc()
    )
    .unwrap();

    let pad = indent + 2;
    let schema = record.schema();
    for (field, value) in record.fields() {
        let present = table.offset_of(field.id).is_some();
        if field.deprecated && !present {
            continue;
        }

        write!(out, "{:pad$}{}: {} = ", "", field.name, schema.type_name(field.ty)).unwrap();
        let suffix = if present || field.ty.is_offset() {
            ""
        } else {
            " (default)"
        };
        match value {
            Value::Absent => writeln!(out, "none").unwrap(),
            Value::Scalar(v) => writeln!(out, "{v}{suffix}").unwrap(),
            Value::Enum { .. } | Value::Str(_) => {
                writeln!(out, "{}{suffix}", inline(&value)).unwrap()
            }
            Value::Table(child) => dump_table(out, child, pad),
            Value::Vector(items) => {
                let nested = matches!(field.ty, FieldType::Vector(tabula_core::ElementType::Table(_)));
                if !nested {
                    let items: Vec<_> = items.iter().map(inline).collect();
                    writeln!(out, "[{}]", items.join(", ")).unwrap();
                    continue;
                }
                writeln!(out, "{} items", items.len()).unwrap();
                for (idx, item) in items.into_iter().enumerate() {
                    if let Value::Table(child) = item {
                        write!(out, "{:w$}[{idx}] ", "", w = pad + 2).unwrap();
                        dump_table(out, child, pad + 2);
                    }
                }
            }
            Value::Union(union) => match union.record {
                Some(child) => dump_table(out, child, pad),
                None => writeln!(out, "unknown variant {}", union.tag).unwrap(),
            },
        }
    }
}

fn inline(value: &Value<'_>) -> String {
    match value {
        Value::Scalar(v) => v.to_string(),
        Value::Enum {
            value,
            name: Some(name),
        } => format!("{name} ({value})"),
        Value::Enum { value, name: None } => value.to_string(),
        Value::Str(s) => format!("{s:?}"),
        Value::Absent => "none".to_string(),
        Value::Table(record) => format!("{} @{}", record.name(), record.table().loc()),
        Value::Vector(items) => format!("{} items", items.len()),
        Value::Union(union) => format!("tag {}", union.tag),
    }
}
