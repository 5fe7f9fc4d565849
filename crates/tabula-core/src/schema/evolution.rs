//! Compatibility check between two versions of a schema catalog.
//!
//! Old readers and new writers (and vice versa) interoperate as long as:
//! - field ids are stable and never reused for something else
//! - fields are deprecated rather than removed
//! - a field id keeps its type and default
//! - union tags and enum values keep their meaning
//!
//! The buffer format cannot enforce any of this; this module makes it checkable.

use super::types::{FieldDef, Schema, TableDef};

/// A change from `old` to `new` that breaks readers or writers of the other version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvolutionIssue {
    TableRemoved {
        table: String,
    },
    /// Removing a field frees its id for reuse; deprecate it instead.
    FieldRemoved {
        table: String,
        field: String,
        id: u16,
    },
    FieldMoved {
        table: String,
        field: String,
        old_id: u16,
        new_id: u16,
    },
    TypeChanged {
        table: String,
        field: String,
        old: String,
        new: String,
    },
    DefaultChanged {
        table: String,
        field: String,
        old: String,
        new: String,
    },
    UnionVariantRetagged {
        union: String,
        variant: String,
        old_tag: u8,
        new_tag: u8,
    },
    UnionVariantRemoved {
        union: String,
        variant: String,
    },
    EnumValueChanged {
        name: String,
        value: String,
        old: i64,
        new: Option<i64>,
    },
}

impl std::fmt::Display for EvolutionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TableRemoved { table } => write!(f, "table `{table}` removed"),
            Self::FieldRemoved { table, field, id } => {
                write!(f, "{table}.{field} (id {id}) removed; deprecate it instead")
            }
            Self::FieldMoved {
                table,
                field,
                old_id,
                new_id,
            } => write!(f, "{table}.{field} moved from id {old_id} to {new_id}"),
            Self::TypeChanged {
                table,
                field,
                old,
                new,
            } => write!(f, "{table}.{field} changed type from {old} to {new}"),
            Self::DefaultChanged {
                table,
                field,
                old,
                new,
            } => write!(f, "{table}.{field} changed default from {old} to {new}"),
            Self::UnionVariantRetagged {
                union,
                variant,
                old_tag,
                new_tag,
            } => write!(f, "{union}::{variant} retagged from {old_tag} to {new_tag}"),
            Self::UnionVariantRemoved { union, variant } => {
                write!(f, "{union}::{variant} removed")
            }
            Self::EnumValueChanged {
                name,
                value,
                old,
                new: Some(new),
            } => write!(f, "{name}::{value} changed from {old} to {new}"),
            Self::EnumValueChanged {
                name, value, old, ..
            } => write!(f, "{name}::{value} (= {old}) removed"),
        }
    }
}

/// Report every incompatible change from `old` to `new`. Empty means compatible.
pub fn check_evolution(old: &Schema, new: &Schema) -> Vec<EvolutionIssue> {
    let mut issues = Vec::new();

    for old_table in &old.tables {
        match new.find_table(&old_table.name) {
            Some(id) => check_table(old, old_table, new, new.table(id), &mut issues),
            None => issues.push(EvolutionIssue::TableRemoved {
                table: old_table.name.clone(),
            }),
        }
    }

    for old_union in &old.unions {
        let Some(new_union) = new.find_union(&old_union.name).map(|id| new.union_def(id)) else {
            continue;
        };
        for variant in &old_union.variants {
            match new_union.variant_by_name(&variant.name) {
                Some(v) if v.tag != variant.tag => {
                    issues.push(EvolutionIssue::UnionVariantRetagged {
                        union: old_union.name.clone(),
                        variant: variant.name.clone(),
                        old_tag: variant.tag,
                        new_tag: v.tag,
                    })
                }
                Some(_) => {}
                None => issues.push(EvolutionIssue::UnionVariantRemoved {
                    union: old_union.name.clone(),
                    variant: variant.name.clone(),
                }),
            }
        }
    }

    for old_enum in &old.enums {
        let Some(new_enum) = new.find_enum(&old_enum.name).map(|id| new.enum_def(id)) else {
            continue;
        };
        for (value, &old_v) in &old_enum.values {
            let new_v = new_enum.value_of(value);
            if new_v != Some(old_v) {
                issues.push(EvolutionIssue::EnumValueChanged {
                    name: old_enum.name.clone(),
                    value: value.clone(),
                    old: old_v,
                    new: new_v,
                });
            }
        }
    }

    issues
}

fn check_table(
    old: &Schema,
    old_table: &TableDef,
    new: &Schema,
    new_table: &TableDef,
    issues: &mut Vec<EvolutionIssue>,
) {
    for old_field in &old_table.fields {
        let Some(new_field) = new_table.field(&old_field.name) else {
            // A rename keeps the id; only a vanished id is a removal.
            match new_table.field_by_id(old_field.id) {
                Some(renamed) => {
                    check_field(old, old_field, new, renamed, &old_table.name, issues);
                }
                None => issues.push(EvolutionIssue::FieldRemoved {
                    table: old_table.name.clone(),
                    field: old_field.name.clone(),
                    id: old_field.id,
                }),
            }
            continue;
        };

        if new_field.id != old_field.id {
            issues.push(EvolutionIssue::FieldMoved {
                table: old_table.name.clone(),
                field: old_field.name.clone(),
                old_id: old_field.id,
                new_id: new_field.id,
            });
            continue;
        }

        check_field(old, old_field, new, new_field, &old_table.name, issues);
    }
}

fn check_field(
    old: &Schema,
    old_field: &FieldDef,
    new: &Schema,
    new_field: &FieldDef,
    table: &str,
    issues: &mut Vec<EvolutionIssue>,
) {
    let old_ty = old.type_name(old_field.ty);
    let new_ty = new.type_name(new_field.ty);
    if old_ty != new_ty {
        issues.push(EvolutionIssue::TypeChanged {
            table: table.to_string(),
            field: old_field.name.clone(),
            old: old_ty,
            new: new_ty,
        });
        return;
    }

    if old_field.default != new_field.default {
        issues.push(EvolutionIssue::DefaultChanged {
            table: table.to_string(),
            field: old_field.name.clone(),
            old: old_field.default.to_string(),
            new: new_field.default.to_string(),
        });
    }
}
