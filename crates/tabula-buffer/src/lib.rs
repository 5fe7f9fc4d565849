//! Buffer runtime for tabula tables.
//!
//! This crate contains:
//! - Writing: back-to-front [`Arena`], [`Builder`] with vtable deduplication
//! - Reading: zero-copy [`Table`] and [`Vector`] views, in-place [`TableMut`]
//! - Checking: the [verifier](verify) for buffers from untrusted sources
//! - Schema-driven access: [`Record`], [`RecordMut`], [`RecordWriter`], [`dump`]

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod arena;
pub mod builder;
pub mod dump;
pub mod header;
pub mod offset;
pub mod record;
pub mod table;
pub mod vector;
pub mod verifier;
pub mod vtable;

#[cfg(test)]
mod builder_tests;
#[cfg(test)]
mod dump_tests;
#[cfg(test)]
mod record_tests;
#[cfg(test)]
mod test_utils;

pub use arena::Arena;
pub use builder::{BuildError, Builder, BuilderOptions};
pub use dump::{dump, dump_root};
pub use header::{file_identifier, has_identifier, size_prefix};
pub use offset::{Offset, StrRef, TableRef, VectorRef};
pub use record::{FieldInput, Record, RecordError, RecordMut, RecordWriter, UnionValue, Value};
pub use table::{
    Table, TableMut, root_table, root_table_mut, size_prefixed_root_table,
    size_prefixed_root_table_mut,
};
pub use vector::{Follow, Vector};
pub use verifier::{
    VerifierOptions, VerifyError, VerifyErrorKind, verified_root, verify, verify_as,
    verify_size_prefixed,
};
pub use vtable::{VTable, VTableCache, VTableStats};
