//! Message layer for tabula buffers.
//!
//! Every message is a `MessageRoot` table holding a union of the message
//! kinds a catalog declares. This crate ships the client/server and
//! server/server catalogs, encodes messages against any catalog, and routes
//! incoming buffers to per-kind handlers after verifying them.
//!
//! # Example
//!
//! ```
//! use tabula_buffer::FieldInput;
//! use tabula_core::ScalarValue;
//! use tabula_protocol::{Message, catalog, encode_message};
//!
//! let schema = catalog::server_server();
//! let bytes = encode_message(
//!     schema,
//!     "Notify_UserLogout",
//!     &[("account_uid", FieldInput::Scalar(ScalarValue::Int(77)))],
//! )
//! .unwrap();
//!
//! let message = Message::decode(&bytes, schema, &Default::default()).unwrap();
//! assert_eq!(message.kind(), Some("Notify_UserLogout"));
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod dispatch;
pub mod message;


pub use dispatch::{DispatchOptions, Dispatcher, Handler, Trust};
pub use message::{Encoder, Message, encode_message, kinds};

use tabula_buffer::{BuildError, RecordError, VerifyError};

/// Errors that can occur while encoding or dispatching messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The buffer failed verification.
    #[error("invalid message: {0}")]
    Verify(#[from] VerifyError),

    /// A field could not be read or written through the catalog.
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// The catalog's root table carries no union field to hold a message.
    #[error("root table `{0}` has no message union")]
    NotAMessageRoot(String),

    /// The name is not a variant of the message union.
    #[error("`{0}` is not a message kind")]
    UnknownMessage(String),

    /// The buffer's tag matches no variant this catalog knows.
    #[error("unknown message tag {0}")]
    UnknownTag(u8),

    /// The buffer carries no message at all (tag 0).
    #[error("message root holds no message")]
    Empty,

    #[error("no handler registered for `{0}`")]
    NoHandler(String),

    #[error("a handler for `{0}` is already registered")]
    DuplicateHandler(String),

    /// A handler refused the message.
    #[error("{0}")]
    Rejected(String),
}

/// Result type for message operations.
pub type Result<T> = std::result::Result<T, Error>;
