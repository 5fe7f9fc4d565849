//! Schema catalogs: the field descriptors that drive reading, writing,
//! verification and dumps of tables.
//!
//! A catalog is external, versioned configuration. It is loaded from JSON,
//! resolved into id-indexed [`Schema`] form, and can be stored compactly in
//! binary.

mod binary;
mod evolution;
mod json;
mod types;


pub use evolution::{EvolutionIssue, check_evolution};
pub use json::SchemaError;
pub use types::{
    ElementType, EnumDef, EnumId, FieldDef, FieldType, Schema, TableDef, TableId, UnionDef,
    UnionId, UnionVariant,
};
