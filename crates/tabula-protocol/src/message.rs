//! The message root: a table whose union field carries one message.

use tabula_buffer::{
    Builder, FieldInput, Offset, Record, RecordWriter, TableRef, Value, VerifierOptions,
    verified_root,
};
use tabula_core::{FieldDef, FieldType, Schema, TableId, UnionDef};

use crate::{Error, Result};

/// A decoded message: the root table and the message it carries.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    root: Record<'a>,
    tag: u8,
    kind: Option<&'a str>,
    body: Option<Record<'a>>,
}

impl<'a> Message<'a> {
    /// Verify `buf` against the catalog, then decode it.
    pub fn decode(buf: &'a [u8], schema: &'a Schema, options: &VerifierOptions) -> Result<Self> {
        verified_root(buf, schema, options)?;
        Self::from_trusted(buf, schema)
    }

    /// Decode a buffer that is already verified or comes from a trusted peer.
    pub fn from_trusted(buf: &'a [u8], schema: &'a Schema) -> Result<Self> {
        let root = Record::root(buf, schema)?;
        let field = message_field(schema, root.table_id())?;

        let tag = root.table().get::<u8>(field.id - 1, 0);
        let (kind, body) = match root.read(field) {
            Value::Union(union) => (union.variant, union.record),
            _ => (None, None),
        };
        Ok(Self {
            root,
            tag,
            kind,
            body,
        })
    }

    /// The union tag; 0 when the root holds no message.
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// The message kind, `None` for tag 0 or tags this catalog does not know.
    pub fn kind(&self) -> Option<&'a str> {
        self.kind
    }

    /// The message table, typed by its kind.
    pub fn body(&self) -> Option<Record<'a>> {
        self.body
    }

    pub fn root(&self) -> Record<'a> {
        self.root
    }
}

/// Builds messages for one catalog, reusing its buffer between messages.
pub struct Encoder<'s> {
    schema: &'s Schema,
    builder: Builder,
}

impl<'s> Encoder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self::with_builder(schema, Builder::new())
    }

    pub fn with_builder(schema: &'s Schema, builder: Builder) -> Self {
        Self { schema, builder }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Write a table the next message will reference, e.g. an element of a
    /// vector field or the inner message of a relay.
    pub fn table(&mut self, name: &str, fields: &[(&str, FieldInput<'_>)]) -> Result<Offset<TableRef>> {
        let writer = RecordWriter::for_name(self.schema, name)?;
        Ok(writer.write(&mut self.builder, fields)?)
    }

    /// Write the message body, wrap it in the root and seal the buffer with
    /// the catalog's file identifier. The encoder is ready for the next
    /// message afterwards, including after a failure.
    pub fn encode(&mut self, kind: &str, fields: &[(&str, FieldInput<'_>)]) -> Result<Vec<u8>> {
        let res = self.encode_inner(kind, fields);
        self.builder.reset();
        res
    }

    fn encode_inner(&mut self, kind: &str, fields: &[(&str, FieldInput<'_>)]) -> Result<Vec<u8>> {
        let root_id = self
            .schema
            .root_table()
            .ok_or(tabula_buffer::RecordError::NoRootType)?;
        let field = message_field(self.schema, root_id)?;
        let union = union_of(self.schema, field);
        let variant = union
            .variant_by_name(kind)
            .ok_or_else(|| Error::UnknownMessage(kind.to_string()))?;

        let body = RecordWriter::new(self.schema, variant.table).write(&mut self.builder, fields)?;
        let root = RecordWriter::new(self.schema, root_id).write(
            &mut self.builder,
            &[(
                field.name.as_str(),
                FieldInput::Union {
                    variant: &variant.name,
                    value: body,
                },
            )],
        )?;
        self.builder.finish(root, self.schema.file_identifier.as_ref())?;

        let bytes = self.builder.finished_data()?.to_vec();
        tracing::debug!(kind, len = bytes.len(), "message encoded");
        Ok(bytes)
    }
}

/// Encode one message of kind `kind` against `schema`.
pub fn encode_message(schema: &Schema, kind: &str, fields: &[(&str, FieldInput<'_>)]) -> Result<Vec<u8>> {
    Encoder::new(schema).encode(kind, fields)
}

/// The union field of a message root table.
fn message_field(schema: &Schema, root: TableId) -> Result<&FieldDef> {
    let def = schema.table(root);
    def.fields
        .iter()
        .find(|f| matches!(f.ty, FieldType::Union(_)))
        .ok_or_else(|| Error::NotAMessageRoot(def.name.clone()))
}

fn union_of<'s>(schema: &'s Schema, field: &FieldDef) -> &'s UnionDef {
    match field.ty {
        FieldType::Union(id) => schema.union_def(id),
        _ => unreachable!("message field is a union"),
    }
}

/// Names of every message kind the catalog declares, in tag order.
pub fn kinds(schema: &Schema) -> Result<impl Iterator<Item = &str>> {
    let root = schema.root_table().ok_or(tabula_buffer::RecordError::NoRootType)?;
    let field = message_field(schema, root)?;
    Ok(union_of(schema, field).variants.iter().map(|v| v.name.as_str()))
}
