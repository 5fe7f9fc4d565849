#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Shared primitives for tabula buffers.
//!
//! Two halves:
//! - **Layout**: wire constants, alignment, little-endian scalar codecs
//! - **Schema**: field descriptors loaded from a versioned catalog, plus an
//!   evolution checker between catalog versions

mod invariants;
pub mod layout;
pub mod scalar;
pub mod schema;


pub use layout::{MAX_BUFFER_SIZE, SOffset, UOffset, VOffset};
pub use scalar::{Scalar, ScalarType, ScalarValue};
pub use schema::{
    ElementType, EnumDef, EnumId, EvolutionIssue, FieldDef, FieldType, Schema, SchemaError,
    TableDef, TableId, UnionDef, UnionId, UnionVariant, check_evolution,
};
