//! Message catalogs shipped with the crate.
//!
//! Both are parsed on first use and live for the rest of the process.

use std::sync::LazyLock;

use tabula_core::Schema;

static CLIENT_SERVER: LazyLock<Schema> = LazyLock::new(|| {
    Schema::from_json(include_str!("../schemas/protocol_cs.json"))
        .expect("embedded client/server catalog must parse")
});

static SERVER_SERVER: LazyLock<Schema> = LazyLock::new(|| {
    Schema::from_json(include_str!("../schemas/protocol_ss.json"))
        .expect("embedded server/server catalog must parse")
});

/// Messages exchanged between game clients and the login server.
pub fn client_server() -> &'static Schema {
    &CLIENT_SERVER
}

/// Messages exchanged between servers (login, manager, world).
pub fn server_server() -> &'static Schema {
    &SERVER_SERVER
}

/// Look up a catalog by its namespace.
pub fn from_namespace(namespace: &str) -> Option<&'static Schema> {
    all()
        .into_iter()
        .find(|schema| schema.namespace.as_deref() == Some(namespace))
}

/// Every embedded catalog.
pub fn all() -> [&'static Schema; 2] {
    [client_server(), server_server()]
}
