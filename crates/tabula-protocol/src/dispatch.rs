//! Routes incoming messages to handlers by kind.
//!
//! Nothing a peer sends can take the dispatcher down: buffers that fail
//! verification, unknown kinds and kinds without a handler are logged and
//! returned as errors.

use indexmap::IndexMap;
use serde::Deserialize;
use tabula_buffer::{Record, VerifierOptions};
use tabula_core::Schema;

use crate::message::{Message, kinds};
use crate::{Error, Result};

/// Whether incoming buffers are verified before they are read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trust {
    /// Buffers come from this process or an authenticated peer that built
    /// them with this catalog; reads skip verification.
    Trusted,
    #[default]
    Untrusted,
}

/// Dispatcher settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchOptions {
    pub(crate) trust: Trust,
    pub(crate) verifier: VerifierOptions,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust(mut self, trust: Trust) -> Self {
        self.trust = trust;
        self
    }

    pub fn verifier(mut self, verifier: VerifierOptions) -> Self {
        self.verifier = verifier;
        self
    }
}

/// Handles one message kind. Receives the caller's context and the message
/// body typed by its kind.
pub type Handler<C> = Box<dyn Fn(&mut C, Record<'_>) -> Result<()> + Send + Sync>;

/// Handlers for the message kinds of one catalog.
pub struct Dispatcher<'s, C> {
    schema: &'s Schema,
    options: DispatchOptions,
    handlers: IndexMap<String, Handler<C>>,
}

impl<'s, C> Dispatcher<'s, C> {
    pub fn new(schema: &'s Schema) -> Self {
        Self::with_options(schema, DispatchOptions::default())
    }

    pub fn with_options(schema: &'s Schema, options: DispatchOptions) -> Self {
        Self {
            schema,
            options,
            handlers: IndexMap::new(),
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Register the handler for `kind`. The kind must be a variant of the
    /// catalog's message union and have no handler yet.
    pub fn register<F>(&mut self, kind: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut C, Record<'_>) -> Result<()> + Send + Sync + 'static,
    {
        if !kinds(self.schema)?.any(|k| k == kind) {
            return Err(Error::UnknownMessage(kind.to_string()));
        }
        if self.handlers.contains_key(kind) {
            return Err(Error::DuplicateHandler(kind.to_string()));
        }
        self.handlers.insert(kind.to_string(), Box::new(handler));
        Ok(())
    }

    /// Kinds with a handler, in registration order.
    pub fn handled(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Decode `bytes` and run the handler for its kind. Returns the kind
    /// that was handled.
    pub fn dispatch(&self, ctx: &mut C, bytes: &[u8]) -> Result<&str> {
        let message = match self.options.trust {
            Trust::Trusted => Message::from_trusted(bytes, self.schema)?,
            Trust::Untrusted => Message::decode(bytes, self.schema, &self.options.verifier)
                .inspect_err(|err| {
                    tracing::warn!(error = %err, len = bytes.len(), "rejected untrusted message")
                })?,
        };

        let (Some(kind), Some(body)) = (message.kind(), message.body()) else {
            let err = match message.tag() {
                0 => Error::Empty,
                tag => Error::UnknownTag(tag),
            };
            tracing::info!(tag = message.tag(), "can not find a message kind");
            return Err(err);
        };

        let Some((kind, handler)) = self.handlers.get_key_value(kind) else {
            tracing::info!(kind, "can not find the message handler");
            return Err(Error::NoHandler(kind.to_string()));
        };

        tracing::trace!(kind = kind.as_str(), "dispatching message");
        handler(ctx, body).inspect_err(|err| {
            tracing::warn!(kind = kind.as_str(), error = %err, "message handler failed");
        })?;
        Ok(kind.as_str())
    }
}
