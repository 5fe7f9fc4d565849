//! Compact binary form of a resolved schema, via postcard.

use super::json::SchemaError;
use super::types::Schema;

impl Schema {
    /// Deserialize a schema previously produced by [`Schema::to_binary`].
    pub fn from_binary(bytes: &[u8]) -> Result<Self, SchemaError> {
        postcard::from_bytes(bytes).map_err(SchemaError::Binary)
    }

    /// Serialize the resolved schema.
    pub fn to_binary(&self) -> Vec<u8> {
        postcard::to_allocvec(self).expect("serialization should not fail")
    }
}
