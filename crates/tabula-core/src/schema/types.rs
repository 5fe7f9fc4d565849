//! Resolved, id-indexed schema catalog.
//!
//! Names are resolved to ids once at load time so the buffer runtime never
//! does string lookups on the hot path.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::layout::SIZE_UOFFSET;
use crate::scalar::{ScalarType, ScalarValue};

/// Index of a table in [`Schema::tables`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u16);

/// Index of an enum in [`Schema::enums`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumId(pub u16);

/// Index of a union in [`Schema::unions`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnionId(pub u16);

/// What a field stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Scalar(ScalarType),
    /// Named integer constants stored as `repr`.
    Enum { id: EnumId, repr: ScalarType },
    String,
    Table(TableId),
    Vector(ElementType),
    /// Discriminant (u8) of the union stored in the next field id.
    UnionType(UnionId),
    /// Offset to the table selected by the preceding discriminant.
    Union(UnionId),
}

impl FieldType {
    /// Bytes the field occupies inside its table.
    pub fn inline_size(self) -> usize {
        match self.scalar() {
            Some(ty) => ty.size(),
            None => SIZE_UOFFSET,
        }
    }

    /// Underlying scalar type, for fields stored inline.
    pub fn scalar(self) -> Option<ScalarType> {
        match self {
            Self::Scalar(ty) | Self::Enum { repr: ty, .. } => Some(ty),
            Self::UnionType(_) => Some(ScalarType::U8),
            Self::String | Self::Table(_) | Self::Vector(_) | Self::Union(_) => None,
        }
    }

    /// Whether the field holds a uoffset to out-of-line data.
    pub fn is_offset(self) -> bool {
        self.scalar().is_none()
    }
}

/// Element of a vector field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Scalar(ScalarType),
    Enum { id: EnumId, repr: ScalarType },
    String,
    Table(TableId),
}

impl ElementType {
    /// Bytes each element occupies inside the vector.
    pub fn size(self) -> usize {
        match self {
            Self::Scalar(ty) | Self::Enum { repr: ty, .. } => ty.size(),
            Self::String | Self::Table(_) => SIZE_UOFFSET,
        }
    }

    pub fn scalar(self) -> Option<ScalarType> {
        match self {
            Self::Scalar(ty) | Self::Enum { repr: ty, .. } => Some(ty),
            Self::String | Self::Table(_) => None,
        }
    }
}

/// Field descriptor: everything the runtime needs to read or write one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub id: u16,
    pub ty: FieldType,
    /// Value reported when the field is absent. Zero for offset fields.
    pub default: ScalarValue,
    pub deprecated: bool,
    pub required: bool,
}

/// A table: fields ordered by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl TableDef {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by id.
    pub fn field_by_id(&self, id: u16) -> Option<&FieldDef> {
        self.fields
            .binary_search_by_key(&id, |f| f.id)
            .ok()
            .map(|idx| &self.fields[idx])
    }

    /// Number of vtable slots this schema version declares (highest id + 1).
    pub fn field_count(&self) -> u16 {
        self.fields.last().map_or(0, |f| f.id + 1)
    }
}

/// Named integer constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub repr: ScalarType,
    /// Name → value, in declaration order.
    pub values: IndexMap<String, i64>,
}

impl EnumDef {
    /// First declared name for `value`.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|&(_, &v)| v == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }
}

/// One alternative of a union. Tag 0 is reserved for "none".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionVariant {
    pub name: String,
    pub tag: u8,
    pub table: TableId,
}

/// Tagged union of tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub variants: Vec<UnionVariant>,
}

impl UnionDef {
    pub fn variant_by_tag(&self, tag: u8) -> Option<&UnionVariant> {
        self.variants.iter().find(|v| v.tag == tag)
    }

    pub fn variant_by_name(&self, name: &str) -> Option<&UnionVariant> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// A resolved schema catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub namespace: Option<String>,
    pub file_identifier: Option<[u8; 4]>,
    pub root: Option<TableId>,
    pub tables: Vec<TableDef>,
    pub enums: Vec<EnumDef>,
    pub unions: Vec<UnionDef>,
}

impl Schema {
    /// Get a table by id. Ids come from this schema, so an unknown id is a bug.
    pub fn table(&self, id: TableId) -> &TableDef {
        self.ensure_table(id)
    }

    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        self.ensure_enum(id)
    }

    pub fn union_def(&self, id: UnionId) -> &UnionDef {
        self.ensure_union(id)
    }

    /// Find a table by name.
    pub fn find_table(&self, name: &str) -> Option<TableId> {
        self.tables
            .iter()
            .position(|t| t.name == name)
            .map(|idx| TableId(idx as u16))
    }

    pub fn find_enum(&self, name: &str) -> Option<EnumId> {
        self.enums
            .iter()
            .position(|e| e.name == name)
            .map(|idx| EnumId(idx as u16))
    }

    pub fn find_union(&self, name: &str) -> Option<UnionId> {
        self.unions
            .iter()
            .position(|u| u.name == name)
            .map(|idx| UnionId(idx as u16))
    }

    /// Declared root table, if any.
    pub fn root_table(&self) -> Option<TableId> {
        self.root
    }

    /// Schema-language spelling of a field type, e.g. `[string]` or `ErrorCode`.
    pub fn type_name(&self, ty: FieldType) -> String {
        match ty {
            FieldType::Scalar(s) => s.name().to_string(),
            FieldType::Enum { id, .. } => self.enum_def(id).name.clone(),
            FieldType::String => "string".to_string(),
            FieldType::Table(id) => self.table(id).name.clone(),
            FieldType::Vector(elem) => format!("[{}]", self.element_type_name(elem)),
            FieldType::UnionType(id) => format!("{}(type)", self.union_def(id).name),
            FieldType::Union(id) => self.union_def(id).name.clone(),
        }
    }

    pub fn element_type_name(&self, elem: ElementType) -> String {
        match elem {
            ElementType::Scalar(s) => s.name().to_string(),
            ElementType::Enum { id, .. } => self.enum_def(id).name.clone(),
            ElementType::String => "string".to_string(),
            ElementType::Table(id) => self.table(id).name.clone(),
        }
    }
}
