//! Process-wide connector registry.
//!
//! Maps a backend type name to a factory that interprets the raw
//! `database.connection` YAML node. Built-in connectors are registered when
//! the registry is first touched; additional factories may be registered
//! before serving starts. Registration is not synchronized against
//! concurrent lookups mid-flight, matching the initialize-only lifecycle.

use crate::Connector;
use once_cell::sync::Lazy;
use sqlgate_core::{GatewayError, GatewayResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Factory producing a connector from the raw `connection` YAML node.
pub type ConnectorFactory = fn(&serde_yaml::Value) -> GatewayResult<Arc<dyn Connector>>;

static REGISTRY: Lazy<RwLock<HashMap<String, ConnectorFactory>>> = Lazy::new(|| {
    let mut map: HashMap<String, ConnectorFactory> = HashMap::new();
    map.insert("postgres".into(), crate::postgres::factory);
    map.insert("postgresql".into(), crate::postgres::factory);
    map.insert("sqlite".into(), crate::sqlite::factory);
    map.insert("snowflake".into(), crate::snowflake::factory);
    RwLock::new(map)
});

/// Register a factory for a backend type, replacing any existing one.
pub fn register(backend: impl Into<String>, factory: ConnectorFactory) {
    REGISTRY
        .write()
        .expect("connector registry poisoned")
        .insert(backend.into(), factory);
}

/// Look up the factory for `backend` and build a connector from the raw
/// connection node.
pub fn new_connector(
    backend: &str,
    connection: &serde_yaml::Value,
) -> GatewayResult<Arc<dyn Connector>> {
    let factory = {
        let registry = REGISTRY.read().expect("connector registry poisoned");
        registry.get(backend).copied()
    };
    match factory {
        Some(factory) => factory(connection),
        None => Err(GatewayError::UnknownBackend {
            backend: backend.to_string(),
        }),
    }
}

/// Registered backend type names.
pub fn backends() -> Vec<String> {
    let registry = REGISTRY.read().expect("connector registry poisoned");
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend() {
        let err = new_connector("oracle", &serde_yaml::Value::Null).err().unwrap();
        assert!(matches!(err, GatewayError::UnknownBackend { backend } if backend == "oracle"));
    }

    #[test]
    fn test_builtin_backends_present() {
        let names = backends();
        for expected in ["postgres", "sqlite", "snowflake"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_sqlite_factory_from_scalar_dsn() {
        let node = serde_yaml::Value::String("sqlite::memory:".into());
        let connector = new_connector("sqlite", &node).unwrap();
        assert_eq!(connector.info().backend, "sqlite");
    }
}
