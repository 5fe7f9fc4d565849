//! JSON schema catalogs.
//!
//! Two layers:
//! - **Raw layer**: 1:1 serde mapping of the catalog document
//! - **Resolution**: names → ids, implicit field ids, defaults checked against types

use indexmap::IndexMap;
use serde::Deserialize;

use super::types::{
    ElementType, EnumDef, FieldDef, FieldType, Schema, TableDef, TableId, UnionDef, UnionId,
    UnionVariant,
};
use crate::layout::{FILE_IDENTIFIER_LENGTH, MAX_FIELD_ID};
use crate::scalar::{ScalarType, ScalarValue};

/// Error loading or resolving a schema catalog.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary schema: {0}")]
    Binary(#[from] postcard::Error),
    #[error("duplicate type name `{0}`")]
    DuplicateType(String),
    #[error("{table}.{field}: unknown type `{ty}`")]
    UnknownType {
        table: String,
        field: String,
        ty: String,
    },
    #[error("{table}.{field}: vectors of `{ty}` are not supported")]
    UnsupportedVector {
        table: String,
        field: String,
        ty: String,
    },
    #[error("{table}: duplicate field name `{field}`")]
    DuplicateField { table: String, field: String },
    #[error("{table}: field id {id} used twice")]
    DuplicateFieldId { table: String, id: u16 },
    #[error("{table}: either all fields or none must declare an explicit id")]
    MixedFieldIds { table: String },
    #[error("{table}.{field}: field id {id} exceeds the maximum of {MAX_FIELD_ID}")]
    FieldIdTooLarge { table: String, field: String, id: u32 },
    #[error("{table}.{field}: invalid default: {reason}")]
    InvalidDefault {
        table: String,
        field: String,
        reason: String,
    },
    #[error("{table}.{field}: union fields need an id >= 1 (the discriminant takes id - 1)")]
    UnionIdZero { table: String, field: String },
    #[error("{table}.{field}: only string, table, vector and union fields can be required")]
    RequiredScalar { table: String, field: String },
    #[error("enum `{name}`: {reason}")]
    InvalidEnum { name: String, reason: String },
    #[error("union `{name}`: {reason}")]
    InvalidUnion { name: String, reason: String },
    #[error("file identifier must be exactly {FILE_IDENTIFIER_LENGTH} bytes, got `{0}`")]
    InvalidIdentifier(String),
    #[error("root type `{0}` is not a table")]
    UnknownRootType(String),
}

// ============================================================================
// Raw Layer
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    file_identifier: Option<String>,
    #[serde(default)]
    root_type: Option<String>,
    #[serde(default)]
    enums: Vec<RawEnum>,
    #[serde(default)]
    unions: Vec<RawUnion>,
    #[serde(default)]
    tables: Vec<RawTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnum {
    name: String,
    #[serde(rename = "type")]
    repr: String,
    values: Vec<RawEnumValue>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnumValue {
    name: String,
    #[serde(default)]
    value: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUnion {
    name: String,
    variants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    required: bool,
}

impl Schema {
    /// Load a schema catalog from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: RawSchema = serde_json::from_str(json)?;
        resolve(raw)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// A named type before fields are resolved.
#[derive(Clone, Copy)]
enum Named {
    Table(TableId),
    Enum(super::types::EnumId, ScalarType),
    Union(UnionId),
}

fn resolve(raw: RawSchema) -> Result<Schema, SchemaError> {
    let file_identifier = raw
        .file_identifier
        .as_deref()
        .map(parse_identifier)
        .transpose()?;

    // Every named type gets its id before any field is resolved, so tables
    // can reference each other regardless of declaration order.
    let mut names: IndexMap<String, Named> = IndexMap::new();
    for (idx, table) in raw.tables.iter().enumerate() {
        declare(&mut names, &table.name, Named::Table(TableId(idx as u16)))?;
    }

    let mut enums = Vec::with_capacity(raw.enums.len());
    for (idx, raw_enum) in raw.enums.into_iter().enumerate() {
        let def = resolve_enum(raw_enum)?;
        let id = super::types::EnumId(idx as u16);
        declare(&mut names, &def.name, Named::Enum(id, def.repr))?;
        enums.push(def);
    }

    let mut unions = Vec::with_capacity(raw.unions.len());
    for (idx, raw_union) in raw.unions.into_iter().enumerate() {
        let def = resolve_union(raw_union, &names)?;
        declare(&mut names, &def.name, Named::Union(UnionId(idx as u16)))?;
        unions.push(def);
    }

    let mut tables = Vec::with_capacity(raw.tables.len());
    for raw_table in raw.tables {
        tables.push(resolve_table(raw_table, &names, &enums)?);
    }

    let root = match raw.root_type {
        Some(name) => match names.get(&name) {
            Some(Named::Table(id)) => Some(*id),
            _ => return Err(SchemaError::UnknownRootType(name)),
        },
        None => None,
    };

    Ok(Schema {
        namespace: raw.namespace,
        file_identifier,
        root,
        tables,
        enums,
        unions,
    })
}

fn declare(names: &mut IndexMap<String, Named>, name: &str, named: Named) -> Result<(), SchemaError> {
    if ScalarType::parse(name).is_some() || name == "string" || names.contains_key(name) {
        return Err(SchemaError::DuplicateType(name.to_string()));
    }
    names.insert(name.to_string(), named);
    Ok(())
}

fn parse_identifier(ident: &str) -> Result<[u8; 4], SchemaError> {
    ident
        .as_bytes()
        .try_into()
        .map_err(|_| SchemaError::InvalidIdentifier(ident.to_string()))
}

fn resolve_enum(raw: RawEnum) -> Result<EnumDef, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidEnum {
        name: raw.name.clone(),
        reason,
    };

    let repr = ScalarType::parse(&raw.repr)
        .filter(|ty| ty.is_integer())
        .ok_or_else(|| invalid(format!("underlying type `{}` is not an integer", raw.repr)))?;

    let mut values = IndexMap::new();
    let mut next = 0i64;
    for value in &raw.values {
        let v = value.value.unwrap_or(next);
        let fits = if v < 0 {
            repr.fits(ScalarValue::Int(v))
        } else {
            repr.fits(ScalarValue::UInt(v as u64))
        };
        if !fits {
            return Err(invalid(format!("value {v} of `{}` does not fit {repr}", value.name)));
        }
        if values.insert(value.name.clone(), v).is_some() {
            return Err(invalid(format!("duplicate value name `{}`", value.name)));
        }
        next = v.wrapping_add(1);
    }

    Ok(EnumDef {
        name: raw.name,
        repr,
        values,
    })
}

fn resolve_union(raw: RawUnion, names: &IndexMap<String, Named>) -> Result<UnionDef, SchemaError> {
    if raw.variants.len() > u8::MAX as usize {
        return Err(SchemaError::InvalidUnion {
            name: raw.name,
            reason: format!("{} variants exceed the u8 tag range", raw.variants.len()),
        });
    }

    let mut variants = Vec::with_capacity(raw.variants.len());
    for (idx, name) in raw.variants.iter().enumerate() {
        let Some(Named::Table(table)) = names.get(name) else {
            return Err(SchemaError::InvalidUnion {
                name: raw.name.clone(),
                reason: format!("variant `{name}` is not a table"),
            });
        };
        if variants.iter().any(|v: &UnionVariant| v.name == *name) {
            return Err(SchemaError::InvalidUnion {
                name: raw.name.clone(),
                reason: format!("variant `{name}` listed twice"),
            });
        }
        variants.push(UnionVariant {
            name: name.clone(),
            tag: (idx + 1) as u8,
            table: *table,
        });
    }

    Ok(UnionDef {
        name: raw.name,
        variants,
    })
}

fn resolve_table(
    raw: RawTable,
    names: &IndexMap<String, Named>,
    enums: &[EnumDef],
) -> Result<TableDef, SchemaError> {
    let explicit = raw.fields.iter().filter(|f| f.id.is_some()).count();
    if explicit != 0 && explicit != raw.fields.len() {
        return Err(SchemaError::MixedFieldIds { table: raw.name });
    }

    let mut fields: Vec<FieldDef> = Vec::with_capacity(raw.fields.len());
    let mut next_id = 0u32;
    for raw_field in &raw.fields {
        let ty = resolve_type(&raw.name, raw_field, names)?;

        // A union occupies two slots: the u8 discriminant, then the offset.
        let (type_id, value_id) = match (ty, raw_field.id) {
            (FieldType::Union(_), Some(0)) => {
                return Err(SchemaError::UnionIdZero {
                    table: raw.name.clone(),
                    field: raw_field.name.clone(),
                });
            }
            (FieldType::Union(_), Some(id)) => (Some(id - 1), id),
            (FieldType::Union(_), None) => (Some(next_id), next_id + 1),
            (_, Some(id)) => (None, id),
            (_, None) => (None, next_id),
        };
        let value_id = check_id(&raw.name, &raw_field.name, value_id)?;
        next_id = u32::from(value_id) + 1;

        if let FieldType::Union(union_id) = ty {
            if let Some(type_id) = type_id {
                let discriminant = FieldDef {
                    name: format!("{}_type", raw_field.name),
                    id: check_id(&raw.name, &raw_field.name, type_id)?,
                    ty: FieldType::UnionType(union_id),
                    default: ScalarValue::UInt(0),
                    deprecated: raw_field.deprecated,
                    required: false,
                };
                push_field(&raw.name, &mut fields, discriminant)?;
            }
        }

        let default = resolve_default(&raw.name, raw_field, ty, enums)?;
        if raw_field.required && !ty.is_offset() {
            return Err(SchemaError::RequiredScalar {
                table: raw.name.clone(),
                field: raw_field.name.clone(),
            });
        }

        let field = FieldDef {
            name: raw_field.name.clone(),
            id: value_id,
            ty,
            default,
            deprecated: raw_field.deprecated,
            required: raw_field.required,
        };
        push_field(&raw.name, &mut fields, field)?;
    }

    fields.sort_by_key(|f| f.id);
    Ok(TableDef {
        name: raw.name,
        fields,
    })
}

fn check_id(table: &str, field: &str, id: u32) -> Result<u16, SchemaError> {
    if id > MAX_FIELD_ID as u32 {
        return Err(SchemaError::FieldIdTooLarge {
            table: table.to_string(),
            field: field.to_string(),
            id,
        });
    }
    Ok(id as u16)
}

fn push_field(table: &str, fields: &mut Vec<FieldDef>, field: FieldDef) -> Result<(), SchemaError> {
    if fields.iter().any(|f| f.name == field.name) {
        return Err(SchemaError::DuplicateField {
            table: table.to_string(),
            field: field.name,
        });
    }
    if fields.iter().any(|f| f.id == field.id) {
        return Err(SchemaError::DuplicateFieldId {
            table: table.to_string(),
            id: field.id,
        });
    }
    fields.push(field);
    Ok(())
}

fn resolve_type(
    table: &str,
    field: &RawField,
    names: &IndexMap<String, Named>,
) -> Result<FieldType, SchemaError> {
    let unknown = || SchemaError::UnknownType {
        table: table.to_string(),
        field: field.name.clone(),
        ty: field.ty.clone(),
    };

    if let Some(inner) = field.ty.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let elem = match inner {
            "string" => ElementType::String,
            _ => match ScalarType::parse(inner) {
                Some(ty) => ElementType::Scalar(ty),
                None => match names.get(inner) {
                    Some(Named::Table(id)) => ElementType::Table(*id),
                    Some(Named::Enum(id, repr)) => ElementType::Enum {
                        id: *id,
                        repr: *repr,
                    },
                    Some(Named::Union(_)) => {
                        return Err(SchemaError::UnsupportedVector {
                            table: table.to_string(),
                            field: field.name.clone(),
                            ty: inner.to_string(),
                        });
                    }
                    None if inner.starts_with('[') => {
                        return Err(SchemaError::UnsupportedVector {
                            table: table.to_string(),
                            field: field.name.clone(),
                            ty: inner.to_string(),
                        });
                    }
                    None => return Err(unknown()),
                },
            },
        };
        return Ok(FieldType::Vector(elem));
    }

    if field.ty == "string" {
        return Ok(FieldType::String);
    }
    if let Some(ty) = ScalarType::parse(&field.ty) {
        return Ok(FieldType::Scalar(ty));
    }
    match names.get(field.ty.as_str()) {
        Some(Named::Table(id)) => Ok(FieldType::Table(*id)),
        Some(Named::Enum(id, repr)) => Ok(FieldType::Enum {
            id: *id,
            repr: *repr,
        }),
        Some(Named::Union(id)) => Ok(FieldType::Union(*id)),
        None => Err(unknown()),
    }
}

fn resolve_default(
    table: &str,
    field: &RawField,
    ty: FieldType,
    enums: &[EnumDef],
) -> Result<ScalarValue, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDefault {
        table: table.to_string(),
        field: field.name.clone(),
        reason,
    };

    let Some(scalar) = ty.scalar() else {
        return match field.default {
            None => Ok(ScalarValue::UInt(0)),
            Some(_) => Err(invalid("only scalar and enum fields take a default".into())),
        };
    };

    let Some(json) = &field.default else {
        return Ok(scalar.zero());
    };

    let value = match json {
        serde_json::Value::Bool(b) if scalar == ScalarType::Bool => ScalarValue::Bool(*b),
        serde_json::Value::Number(n) if scalar.is_float() => match n.as_f64() {
            Some(v) => ScalarValue::Float(v),
            None => return Err(invalid(format!("`{n}` is not a number"))),
        },
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                ScalarValue::UInt(v)
            } else if let Some(v) = n.as_i64() {
                ScalarValue::Int(v)
            } else {
                return Err(invalid(format!("`{n}` is not an integer")));
            }
        }
        serde_json::Value::String(name) => {
            let FieldType::Enum { id, .. } = ty else {
                return Err(invalid(format!("`{name}` is only valid for enum fields")));
            };
            match enums[id.0 as usize].value_of(name) {
                Some(v) if v < 0 => ScalarValue::Int(v),
                Some(v) => ScalarValue::UInt(v as u64),
                None => return Err(invalid(format!("`{name}` is not a value of the enum"))),
            }
        }
        other => return Err(invalid(format!("`{other}` does not match type {scalar}"))),
    };

    if !scalar.fits(value) {
        return Err(invalid(format!("{value} does not fit {scalar}")));
    }

    // Normalize so reads and defaults compare equal variant-for-variant.
    let mut raw = [0u8; 8];
    scalar.write(value, &mut raw);
    Ok(scalar.read(&raw))
}
