//! Schema-driven access to tables.
//!
//! A [`Record`] pairs a table with its descriptor from a schema catalog, so
//! any message can be read by field name without per-message code.
//! [`RecordWriter`] is the writing counterpart, and [`RecordMut`] covers
//! in-place mutation.

use tabula_core::layout::{SIZE_UOFFSET, read_u32_le};
use tabula_core::{
    ElementType, FieldDef, FieldType, ScalarType, ScalarValue, Schema, TableDef, TableId,
};

use crate::builder::{BuildError, Builder};
use crate::offset::{Offset, TableRef, VectorRef};
use crate::table::{Table, TableMut, root_table};
use crate::vector::{Vector, deref};

/// Error reading or writing a table through its descriptor.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("table `{table}` has no field `{field}`")]
    UnknownField { table: String, field: String },
    #[error("no table named `{0}`")]
    UnknownTable(String),
    #[error("schema declares no root type")]
    NoRootType,
    #[error("{table}.{field} is deprecated")]
    Deprecated { table: String, field: String },
    #[error("{table}.{field} is required")]
    MissingRequired { table: String, field: String },
    #[error("{table}.{field} is a {expected} field")]
    TypeMismatch {
        table: String,
        field: String,
        expected: String,
    },
    #[error("{table}.{field}: {value} does not fit {ty}")]
    OutOfRange {
        table: String,
        field: String,
        value: String,
        ty: ScalarType,
    },
    #[error("{table}.{field}: `{name}` is not a known {kind}")]
    UnknownName {
        table: String,
        field: String,
        kind: &'static str,
        name: String,
    },
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// A field value read through its descriptor.
#[derive(Clone, Debug)]
pub enum Value<'a> {
    /// Offset field not present.
    Absent,
    Scalar(ScalarValue),
    Enum {
        value: ScalarValue,
        /// `None` for values this schema version does not know.
        name: Option<&'a str>,
    },
    Str(&'a str),
    Table(Record<'a>),
    Vector(Vec<Value<'a>>),
    Union(UnionValue<'a>),
}

/// A present union field.
#[derive(Clone, Debug)]
pub struct UnionValue<'a> {
    pub tag: u8,
    /// `None` for tags this schema version does not know.
    pub variant: Option<&'a str>,
    pub record: Option<Record<'a>>,
}

impl<'a> Value<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The scalar behind a scalar or enum field.
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Self::Scalar(value) | Self::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Enum { name, .. } => *name,
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<Record<'a>> {
        match self {
            Self::Table(record) => Some(*record),
            Self::Union(union) => union.record,
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Value<'a>]> {
        match self {
            Self::Vector(items) => Some(items),
            _ => None,
        }
    }
}

/// A table viewed through its schema descriptor.
#[derive(Clone, Copy)]
pub struct Record<'a> {
    table: Table<'a>,
    schema: &'a Schema,
    id: TableId,
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.name())
            .field("loc", &self.table.loc())
            .finish()
    }
}

impl<'a> Record<'a> {
    pub fn new(table: Table<'a>, schema: &'a Schema, id: TableId) -> Self {
        Self { table, schema, id }
    }

    /// The buffer's root, typed by the schema's root type. The buffer must be
    /// trusted or verified.
    pub fn root(buf: &'a [u8], schema: &'a Schema) -> Result<Self, RecordError> {
        let id = schema.root_table().ok_or(RecordError::NoRootType)?;
        Ok(Self::new(root_table(buf), schema, id))
    }

    pub fn table(&self) -> Table<'a> {
        self.table
    }

    pub fn table_id(&self) -> TableId {
        self.id
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn def(&self) -> &'a TableDef {
        self.schema.table(self.id)
    }

    pub fn name(&self) -> &'a str {
        &self.def().name
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> Result<Value<'a>, RecordError> {
        let def = self.def();
        let field = def.field(name).ok_or_else(|| RecordError::UnknownField {
            table: def.name.clone(),
            field: name.to_string(),
        })?;
        Ok(self.read(field))
    }

    /// Every field of the descriptor with its value, in id order. Union
    /// discriminants are folded into their union field.
    pub fn fields(self) -> impl Iterator<Item = (&'a FieldDef, Value<'a>)> + 'a {
        self.def()
            .fields
            .iter()
            .filter(|f| !matches!(f.ty, FieldType::UnionType(_)))
            .map(move |f| (f, self.read(f)))
    }

    /// Read the field described by `field`.
    pub fn read(&self, field: &FieldDef) -> Value<'a> {
        let table = self.table;
        match field.ty {
            FieldType::Scalar(ty) => Value::Scalar(table.get_value(field.id, ty, field.default)),
            FieldType::UnionType(_) => {
                Value::Scalar(table.get_value(field.id, ScalarType::U8, field.default))
            }
            FieldType::Enum { id, repr } => {
                let value = table.get_value(field.id, repr, field.default);
                Value::Enum {
                    value,
                    name: self.schema.enum_def(id).name_of(value.as_i64()),
                }
            }
            FieldType::String => match table.get_str(field.id) {
                Some(s) => Value::Str(s),
                None => Value::Absent,
            },
            FieldType::Table(id) => match table.get_table(field.id) {
                Some(child) => Value::Table(Record::new(child, self.schema, id)),
                None => Value::Absent,
            },
            FieldType::Vector(elem) => match table.offset_of(field.id) {
                Some(offset) => {
                    let loc = deref(table.buf(), table.loc() + offset as usize);
                    Value::Vector(self.read_vector(loc, elem))
                }
                None => Value::Absent,
            },
            FieldType::Union(union) => {
                let tag = table.get::<u8>(field.id - 1, 0);
                let Some(child) = table.get_table(field.id).filter(|_| tag != 0) else {
                    return Value::Absent;
                };
                let variant = self.schema.union_def(union).variant_by_tag(tag);
                Value::Union(UnionValue {
                    tag,
                    variant: variant.map(|v| v.name.as_str()),
                    record: variant.map(|v| Record::new(child, self.schema, v.table)),
                })
            }
        }
    }

    fn read_vector(&self, loc: usize, elem: ElementType) -> Vec<Value<'a>> {
        let buf = self.table.buf();
        match elem {
            ElementType::Scalar(ty) => scalar_elements(buf, loc, ty)
                .map(|chunk| Value::Scalar(ty.read(chunk)))
                .collect(),
            ElementType::Enum { id, repr } => {
                let def = self.schema.enum_def(id);
                scalar_elements(buf, loc, repr)
                    .map(|chunk| {
                        let value = repr.read(chunk);
                        Value::Enum {
                            value,
                            name: def.name_of(value.as_i64()),
                        }
                    })
                    .collect()
            }
            ElementType::String => Vector::<&str>::new(buf, loc).iter().map(Value::Str).collect(),
            ElementType::Table(id) => Vector::<Table<'a>>::new(buf, loc)
                .iter()
                .map(|t| Value::Table(Record::new(t, self.schema, id)))
                .collect(),
        }
    }

    /// String field by name, `None` when absent or not a string.
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        let field = self.def().field(name)?;
        match field.ty {
            FieldType::String => self.table.get_str(field.id),
            _ => None,
        }
    }

    /// Scalar or enum field by name.
    pub fn get_scalar(&self, name: &str) -> Option<ScalarValue> {
        let field = self.def().field(name)?;
        self.read(field).as_scalar()
    }
}

/// A table open for in-place mutation, addressed by field name.
pub struct RecordMut<'a> {
    table: TableMut<'a>,
    schema: &'a Schema,
    id: TableId,
}

impl<'a> RecordMut<'a> {
    pub fn new(table: TableMut<'a>, schema: &'a Schema, id: TableId) -> Self {
        Self { table, schema, id }
    }

    /// Overwrite a present scalar or enum field.
    ///
    /// `Ok(false)` when the field is absent: the layout is fixed, so absent
    /// fields cannot be added after the fact.
    pub fn set(&mut self, name: &str, value: ScalarValue) -> Result<bool, RecordError> {
        let def = self.schema.table(self.id);
        let field = lookup(def, name)?;
        let ty = match field.ty {
            FieldType::Scalar(ty) | FieldType::Enum { repr: ty, .. } => ty,
            _ => return Err(mismatch(def, field, "non-scalar")),
        };
        if !ty.fits(value) {
            return Err(out_of_range(def, field, value, ty));
        }
        Ok(self.table.mutate_value(field.id, ty, value))
    }

    /// A nested table field, for mutation.
    pub fn child(&mut self, name: &str) -> Result<Option<RecordMut<'_>>, RecordError> {
        let def = self.schema.table(self.id);
        let field = lookup(def, name)?;
        let FieldType::Table(child) = field.ty else {
            return Err(mismatch(def, field, "non-table"));
        };
        let schema = self.schema;
        Ok(self
            .table
            .table_mut(field.id)
            .map(|table| RecordMut::new(table, schema, child)))
    }
}

/// Input for one field of [`RecordWriter::write`].
#[derive(Clone, Debug)]
pub enum FieldInput<'v> {
    Scalar(ScalarValue),
    /// Enum value by name.
    Enum(&'v str),
    Str(&'v str),
    Table(Offset<TableRef>),
    /// A vector written beforehand.
    Vector(Offset<VectorRef>),
    Scalars(Vec<ScalarValue>),
    Strings(Vec<&'v str>),
    Tables(Vec<Offset<TableRef>>),
    Union {
        variant: &'v str,
        value: Offset<TableRef>,
    },
}

/// Writes one table type described by a schema.
#[derive(Clone, Copy, Debug)]
pub struct RecordWriter<'s> {
    schema: &'s Schema,
    id: TableId,
}

/// What a field turns into once its out-of-line data is written.
enum Resolved {
    Scalar(ScalarType, ScalarValue, ScalarValue),
    Offset(u32),
    Union { tag: u8, value: Offset<TableRef> },
}

impl<'s> RecordWriter<'s> {
    pub fn new(schema: &'s Schema, id: TableId) -> Self {
        Self { schema, id }
    }

    pub fn for_name(schema: &'s Schema, name: &str) -> Result<Self, RecordError> {
        let id = schema
            .find_table(name)
            .ok_or_else(|| RecordError::UnknownTable(name.to_string()))?;
        Ok(Self::new(schema, id))
    }

    /// Write one table. Strings and vectors given inline are written first,
    /// then the table itself.
    pub fn write(
        &self,
        builder: &mut Builder,
        fields: &[(&str, FieldInput<'_>)],
    ) -> Result<Offset<TableRef>, RecordError> {
        let def = self.schema.table(self.id);

        let mut resolved = Vec::with_capacity(fields.len());
        for (name, input) in fields {
            let field = lookup(def, name)?;
            if field.deprecated {
                return Err(RecordError::Deprecated {
                    table: def.name.clone(),
                    field: field.name.clone(),
                });
            }
            resolved.push((field, self.resolve(builder, def, field, input)?));
        }

        for field in def.fields.iter().filter(|f| f.required) {
            if !resolved.iter().any(|(f, _)| f.id == field.id) {
                return Err(RecordError::MissingRequired {
                    table: def.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        builder.start_object(def.field_count())?;
        for (field, value) in resolved {
            match value {
                Resolved::Scalar(ty, value, default) => {
                    builder.add_value(field.id, ty, value, default)?
                }
                Resolved::Offset(pos) => builder.add_offset(field.id, Offset::<()>::new(pos))?,
                Resolved::Union { tag, value } => {
                    builder.add_field::<u8>(field.id - 1, tag, 0)?;
                    builder.add_offset(field.id, value)?;
                }
            }
        }
        Ok(builder.end_object()?)
    }

    fn resolve(
        &self,
        builder: &mut Builder,
        def: &TableDef,
        field: &FieldDef,
        input: &FieldInput<'_>,
    ) -> Result<Resolved, RecordError> {
        let resolved = match (field.ty, input) {
            (
                FieldType::Scalar(ty) | FieldType::Enum { repr: ty, .. },
                FieldInput::Scalar(value),
            ) => {
                if !ty.fits(*value) {
                    return Err(out_of_range(def, field, *value, ty));
                }
                Resolved::Scalar(ty, *value, field.default)
            }
            (FieldType::Enum { id, repr }, FieldInput::Enum(name)) => {
                let value = self.schema.enum_def(id).value_of(name).ok_or_else(|| {
                    RecordError::UnknownName {
                        table: def.name.clone(),
                        field: field.name.clone(),
                        kind: "enum value",
                        name: name.to_string(),
                    }
                })?;
                Resolved::Scalar(repr, ScalarValue::Int(value), field.default)
            }
            (FieldType::String, FieldInput::Str(s)) => {
                Resolved::Offset(builder.create_string(s)?.value())
            }
            (FieldType::Table(_), FieldInput::Table(offset)) => Resolved::Offset(offset.value()),
            (FieldType::Vector(_), FieldInput::Vector(offset)) => Resolved::Offset(offset.value()),
            (FieldType::Vector(elem), FieldInput::Scalars(values)) => {
                let Some(ty) = elem.scalar() else {
                    return Err(mismatch(def, field, &self.schema.type_name(field.ty)));
                };
                if let Some(bad) = values.iter().find(|v| !ty.fits(**v)) {
                    return Err(out_of_range(def, field, *bad, ty));
                }
                Resolved::Offset(builder.create_scalar_vector(ty, values)?.value())
            }
            (FieldType::Vector(ElementType::String), FieldInput::Strings(items)) => {
                Resolved::Offset(builder.create_vector_of_strings(items)?.value())
            }
            (FieldType::Vector(ElementType::Table(_)), FieldInput::Tables(items)) => {
                Resolved::Offset(builder.create_vector_of_offsets(items)?.value())
            }
            (FieldType::Union(union), FieldInput::Union { variant, value }) => {
                let tag = self
                    .schema
                    .union_def(union)
                    .variant_by_name(variant)
                    .ok_or_else(|| RecordError::UnknownName {
                        table: def.name.clone(),
                        field: field.name.clone(),
                        kind: "union variant",
                        name: variant.to_string(),
                    })?
                    .tag;
                Resolved::Union { tag, value: *value }
            }
            _ => return Err(mismatch(def, field, &self.schema.type_name(field.ty))),
        };
        Ok(resolved)
    }
}

/// Element chunks of the scalar vector whose count is at `loc`.
fn scalar_elements(buf: &[u8], loc: usize, ty: ScalarType) -> std::slice::ChunksExact<'_, u8> {
    let count = read_u32_le(buf, loc) as usize;
    let start = loc + SIZE_UOFFSET;
    buf[start..start + count * ty.size()].chunks_exact(ty.size())
}

fn lookup<'d>(def: &'d TableDef, name: &str) -> Result<&'d FieldDef, RecordError> {
    def.field(name).ok_or_else(|| RecordError::UnknownField {
        table: def.name.clone(),
        field: name.to_string(),
    })
}

fn mismatch(def: &TableDef, field: &FieldDef, expected: &str) -> RecordError {
    RecordError::TypeMismatch {
        table: def.name.clone(),
        field: field.name.clone(),
        expected: expected.to_string(),
    }
}

fn out_of_range(def: &TableDef, field: &FieldDef, value: ScalarValue, ty: ScalarType) -> RecordError {
    RecordError::OutOfRange {
        table: def.name.clone(),
        field: field.name.clone(),
        value: value.to_string(),
        ty,
    }
}
