//! Verifier for buffers from untrusted sources.
//!
//! Walks the buffer from its root using the schema catalog, checking every
//! offset, length and vtable before a reader is allowed to touch it. The
//! walk is bounded by depth and table count, and never panics.

use serde::Deserialize;
use tabula_core::layout::{
    FILE_IDENTIFIER_LENGTH, MAX_BUFFER_SIZE, SIZE_SOFFSET, SIZE_UOFFSET, VTABLE_METADATA_SIZE,
    field_id_to_voffset, read_i32_le, read_u16_le, read_u32_le,
};
use tabula_core::{ElementType, FieldType, Schema, TableId};

use crate::header::{file_identifier, format_identifier, root_pos, size_prefix};
use crate::table::Table;

/// Verifier limits and switches.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierOptions {
    /// Deepest table nesting accepted.
    pub(crate) max_depth: usize,
    /// Most tables visited in one buffer.
    pub(crate) max_tables: usize,
    pub(crate) max_buffer_size: usize,
    /// Require scalars, offsets and vectors to sit at aligned positions.
    pub(crate) check_alignment: bool,
    /// Require the schema's file identifier, when it declares one.
    pub(crate) check_identifier: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_tables: 1_000_000,
            max_buffer_size: MAX_BUFFER_SIZE,
            check_alignment: true,
            check_identifier: true,
        }
    }
}

impl VerifierOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_tables(mut self, count: usize) -> Self {
        self.max_tables = count;
        self
    }

    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes.min(MAX_BUFFER_SIZE);
        self
    }

    pub fn check_alignment(mut self, value: bool) -> Self {
        self.check_alignment = value;
        self
    }

    pub fn check_identifier(mut self, value: bool) -> Self {
        self.check_identifier = value;
        self
    }
}

/// Why a buffer was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyErrorKind {
    #[error("schema declares no root type")]
    NoRootType,
    #[error("buffer of {len} bytes is too small (need at least {min})")]
    BufferTooSmall { len: usize, min: usize },
    #[error("buffer of {len} bytes exceeds the {limit}-byte limit")]
    BufferTooLarge { len: usize, limit: usize },
    #[error("size prefix says {prefix} bytes, but {actual} follow it")]
    SizePrefixMismatch { prefix: u32, actual: usize },
    #[error("file identifier is \"{found}\", expected \"{expected}\"")]
    IdentifierMismatch { expected: String, found: String },
    #[error("{what} at {pos} (+{size}) lies outside the {len}-byte buffer")]
    OutOfBounds {
        what: &'static str,
        pos: usize,
        size: usize,
        len: usize,
    },
    #[error("{what} at {pos} is not {align}-byte aligned")]
    Unaligned {
        what: &'static str,
        pos: usize,
        align: usize,
    },
    #[error("vtable length {0} is not an even number of at least 4")]
    InvalidVTableLength(u16),
    #[error("table length {0} cannot hold its vtable offset")]
    InvalidTableLength(u16),
    #[error("field {id} at table offset {offset} (+{width}) overruns the {table_len}-byte table")]
    FieldOutOfTable {
        id: u16,
        offset: u16,
        width: usize,
        table_len: u16,
    },
    #[error("required field is missing")]
    MissingRequired,
    #[error("string is not NUL-terminated")]
    MissingNul,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("vector of {count} {elem_size}-byte elements overflows")]
    VectorTooLarge { count: u32, elem_size: usize },
    #[error("tables nest deeper than {0}")]
    DepthExceeded(usize),
    #[error("more than {0} tables")]
    TooManyTables(usize),
}

/// A rejected buffer: the reason, and the field path where it was found
/// (e.g. `MessageRoot.message.server_list[2].name`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyError {
    pub kind: VerifyErrorKind,
    pub path: String,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

impl std::error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Verify a buffer whose root is the schema's root type.
pub fn verify(buf: &[u8], schema: &Schema, options: &VerifierOptions) -> Result<(), VerifyError> {
    verified_root(buf, schema, options).map(|_| ())
}

/// Verify a buffer whose root is `table`.
pub fn verify_as(
    buf: &[u8],
    schema: &Schema,
    table: TableId,
    options: &VerifierOptions,
) -> Result<(), VerifyError> {
    run(buf, schema, table, options, false).map(|_| ())
}

/// Verify a size-prefixed buffer whose root is the schema's root type.
pub fn verify_size_prefixed(
    buf: &[u8],
    schema: &Schema,
    options: &VerifierOptions,
) -> Result<(), VerifyError> {
    let root = root_type(schema)?;
    run(buf, schema, root, options, true).map(|_| ())
}

/// Verify, then hand out the root table.
pub fn verified_root<'a>(
    buf: &'a [u8],
    schema: &Schema,
    options: &VerifierOptions,
) -> Result<Table<'a>, VerifyError> {
    let root = root_type(schema)?;
    run(buf, schema, root, options, false)
}

fn root_type(schema: &Schema) -> Result<TableId, VerifyError> {
    schema.root_table().ok_or(VerifyError {
        kind: VerifyErrorKind::NoRootType,
        path: String::new(),
    })
}

fn run<'a>(
    buf: &'a [u8],
    schema: &Schema,
    table: TableId,
    options: &VerifierOptions,
    size_prefixed: bool,
) -> Result<Table<'a>, VerifyError> {
    let mut verifier = Verifier {
        buf,
        schema,
        options,
        depth: 0,
        tables: 0,
        path: String::new(),
    };
    let result = verifier.buffer(table, size_prefixed);
    if let Err(err) = &result {
        tracing::debug!(error = %err, len = buf.len(), "buffer rejected");
    }
    result
}

struct Verifier<'a, 's> {
    buf: &'a [u8],
    schema: &'s Schema,
    options: &'s VerifierOptions,
    depth: usize,
    tables: usize,
    /// Dotted path to the field being checked.
    path: String,
}

impl<'a> Verifier<'a, '_> {
    fn fail<T>(&self, kind: VerifyErrorKind) -> Result<T, VerifyError> {
        Err(VerifyError {
            kind,
            path: self.path.clone(),
        })
    }

    fn buffer(&mut self, table: TableId, size_prefixed: bool) -> Result<Table<'a>, VerifyError> {
        let len = self.buf.len();
        if len > self.options.max_buffer_size {
            return self.fail(VerifyErrorKind::BufferTooLarge {
                len,
                limit: self.options.max_buffer_size,
            });
        }

        let expected_ident = self
            .schema
            .file_identifier
            .filter(|_| self.options.check_identifier);
        let root = root_pos(size_prefixed);
        let mut min = root + SIZE_UOFFSET;
        if expected_ident.is_some() {
            min += FILE_IDENTIFIER_LENGTH;
        }
        if len < min {
            return self.fail(VerifyErrorKind::BufferTooSmall { len, min });
        }

        if size_prefixed {
            let prefix = size_prefix(self.buf).unwrap_or_default();
            if prefix as usize != len - root {
                return self.fail(VerifyErrorKind::SizePrefixMismatch {
                    prefix,
                    actual: len - root,
                });
            }
        }

        if let Some(expected) = expected_ident {
            let found = file_identifier(self.buf, size_prefixed).unwrap_or_default();
            if found != expected {
                return self.fail(VerifyErrorKind::IdentifierMismatch {
                    expected: format_identifier(&expected),
                    found: format_identifier(&found),
                });
            }
        }

        self.path.push_str(&self.schema.table(table).name);
        let loc = self.deref(root, "root offset")?;
        self.table(loc, table)?;
        Ok(Table::new(self.buf, loc))
    }

    fn in_bounds(&self, what: &'static str, pos: usize, size: usize) -> Result<(), VerifyError> {
        match pos.checked_add(size) {
            Some(end) if end <= self.buf.len() => Ok(()),
            _ => self.fail(VerifyErrorKind::OutOfBounds {
                what,
                pos,
                size,
                len: self.buf.len(),
            }),
        }
    }

    fn aligned(&self, what: &'static str, pos: usize, align: usize) -> Result<(), VerifyError> {
        if self.options.check_alignment && pos % align != 0 {
            return self.fail(VerifyErrorKind::Unaligned { what, pos, align });
        }
        Ok(())
    }

    /// Follow the uoffset at `pos`; the target must be inside the buffer.
    fn deref(&self, pos: usize, what: &'static str) -> Result<usize, VerifyError> {
        self.in_bounds(what, pos, SIZE_UOFFSET)?;
        self.aligned(what, pos, SIZE_UOFFSET)?;
        let target = pos + read_u32_le(self.buf, pos) as usize;
        self.in_bounds(what, target, 1)?;
        Ok(target)
    }

    fn table(&mut self, loc: usize, id: TableId) -> Result<(), VerifyError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return self.fail(VerifyErrorKind::DepthExceeded(self.options.max_depth));
        }
        self.tables += 1;
        if self.tables > self.options.max_tables {
            return self.fail(VerifyErrorKind::TooManyTables(self.options.max_tables));
        }

        self.in_bounds("table", loc, SIZE_SOFFSET)?;
        self.aligned("table", loc, SIZE_SOFFSET)?;
        let vtable = loc as i64 - read_i32_le(self.buf, loc) as i64;
        let Ok(vtable) = usize::try_from(vtable) else {
            return self.fail(VerifyErrorKind::OutOfBounds {
                what: "vtable",
                pos: 0,
                size: VTABLE_METADATA_SIZE,
                len: self.buf.len(),
            });
        };
        self.in_bounds("vtable", vtable, VTABLE_METADATA_SIZE)?;
        self.aligned("vtable", vtable, 2)?;

        let vtable_len = read_u16_le(self.buf, vtable);
        let table_len = read_u16_le(self.buf, vtable + 2);
        if (vtable_len as usize) < VTABLE_METADATA_SIZE || vtable_len % 2 != 0 {
            return self.fail(VerifyErrorKind::InvalidVTableLength(vtable_len));
        }
        self.in_bounds("vtable", vtable, vtable_len as usize)?;
        if (table_len as usize) < SIZE_SOFFSET {
            return self.fail(VerifyErrorKind::InvalidTableLength(table_len));
        }
        self.in_bounds("table", loc, table_len as usize)?;

        // Every slot, including fields this schema version does not know.
        let slots = (vtable_len as usize - VTABLE_METADATA_SIZE) / 2;
        for slot in 0..slots {
            let offset = read_u16_le(self.buf, vtable + field_id_to_voffset(slot as u16));
            if offset != 0 && ((offset as usize) < SIZE_SOFFSET || offset >= table_len) {
                return self.fail(VerifyErrorKind::FieldOutOfTable {
                    id: slot as u16,
                    offset,
                    width: 1,
                    table_len,
                });
            }
        }

        let schema = self.schema;
        let def = schema.table(id);
        for field in &def.fields {
            let entry = field_id_to_voffset(field.id);
            let offset = if entry < vtable_len as usize {
                read_u16_le(self.buf, vtable + entry)
            } else {
                0
            };

            let mark = self.path.len();
            self.path.push('.');
            self.path.push_str(&field.name);

            if offset == 0 {
                if field.required {
                    return self.fail(VerifyErrorKind::MissingRequired);
                }
                self.path.truncate(mark);
                continue;
            }

            let width = field.ty.inline_size();
            if offset as usize + width > table_len as usize {
                return self.fail(VerifyErrorKind::FieldOutOfTable {
                    id: field.id,
                    offset,
                    width,
                    table_len,
                });
            }
            let pos = loc + offset as usize;
            self.aligned("field", pos, width)?;

            match field.ty {
                FieldType::Scalar(_) | FieldType::Enum { .. } | FieldType::UnionType(_) => {}
                FieldType::String => {
                    let target = self.deref(pos, "string")?;
                    self.string(target)?;
                }
                FieldType::Table(child) => {
                    let target = self.deref(pos, "table offset")?;
                    self.table(target, child)?;
                }
                FieldType::Vector(elem) => {
                    let target = self.deref(pos, "vector")?;
                    self.vector(target, elem)?;
                }
                FieldType::Union(union) => {
                    let target = self.deref(pos, "union value")?;
                    let tag = Table::new(self.buf, loc).get::<u8>(field.id - 1, 0);
                    // Unknown tags come from newer writers; their tables are skipped.
                    if let Some(variant) = schema.union_def(union).variant_by_tag(tag) {
                        self.table(target, variant.table)?;
                    }
                }
            }

            self.path.truncate(mark);
        }

        self.depth -= 1;
        Ok(())
    }

    fn string(&self, loc: usize) -> Result<(), VerifyError> {
        self.in_bounds("string", loc, SIZE_UOFFSET)?;
        self.aligned("string", loc, SIZE_UOFFSET)?;
        let len = read_u32_le(self.buf, loc) as usize;
        let start = loc + SIZE_UOFFSET;
        // Payload plus the terminator.
        self.in_bounds("string", start, len.saturating_add(1))?;
        if self.buf[start + len] != 0 {
            return self.fail(VerifyErrorKind::MissingNul);
        }
        if std::str::from_utf8(&self.buf[start..start + len]).is_err() {
            return self.fail(VerifyErrorKind::InvalidUtf8);
        }
        Ok(())
    }

    fn vector(&mut self, loc: usize, elem: ElementType) -> Result<(), VerifyError> {
        self.in_bounds("vector", loc, SIZE_UOFFSET)?;
        self.aligned("vector", loc, SIZE_UOFFSET)?;
        let count = read_u32_le(self.buf, loc);
        let elem_size = elem.size();
        let Some(byte_len) = (count as usize).checked_mul(elem_size) else {
            return self.fail(VerifyErrorKind::VectorTooLarge { count, elem_size });
        };
        let start = loc + SIZE_UOFFSET;
        self.in_bounds("vector", start, byte_len)?;
        if count > 0 {
            self.aligned("vector", start, elem_size)?;
        }

        match elem {
            ElementType::Scalar(_) | ElementType::Enum { .. } => {}
            ElementType::String => {
                for idx in 0..count as usize {
                    let mark = self.path.len();
                    self.push_index(idx);
                    let target = self.deref(start + idx * SIZE_UOFFSET, "string")?;
                    self.string(target)?;
                    self.path.truncate(mark);
                }
            }
            ElementType::Table(table) => {
                for idx in 0..count as usize {
                    let mark = self.path.len();
                    self.push_index(idx);
                    let target = self.deref(start + idx * SIZE_UOFFSET, "table offset")?;
                    self.table(target, table)?;
                    self.path.truncate(mark);
                }
            }
        }
        Ok(())
    }

    fn push_index(&mut self, idx: usize) {
        use std::fmt::Write as _;
        let _ = write!(self.path, "[{idx}]");
    }
}
