//! Error taxonomy for the gateway.

use thiserror::Error;

/// Result alias used across the gateway crates.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors raised by the gateway core, connectors and surfaces.
///
/// Config-time variants (`UnknownBackend`, `BadConfig`, `Connect`) are fatal
/// at startup. Per-request variants map onto HTTP status codes and JSON-RPC
/// error codes at the surface layer. Driver detail stays inside `Backend`
/// and is logged, never returned to clients.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No connector factory registered for the configured backend type.
    #[error("unknown backend type: {backend}")]
    UnknownBackend { backend: String },

    /// Invalid configuration value.
    #[error("bad config field {field}: {reason}")]
    BadConfig { field: String, reason: String },

    /// Failed to open or ping the backend.
    #[error("unable to connect to backend: {0}")]
    Connect(String),

    /// A required request parameter is missing.
    #[error("missing required parameter: {name}")]
    MissingParam { name: String },

    /// A request parameter failed coercion to its declared type.
    #[error("invalid parameter {name}: {reason}")]
    BadParam { name: String, reason: String },

    /// A single-row endpoint produced no rows.
    #[error("not found")]
    NotFound,

    /// A mutating statement was attempted on a readonly connector.
    #[error("statement rejected: connector is readonly")]
    Readonly,

    /// Operation attempted after the connector was closed.
    #[error("connector is closed")]
    Closed,

    /// An SSE client stopped draining its outbound queue.
    #[error("slow client: outbound queue overflow")]
    SlowClient,

    /// Wrapped driver or connection failure.
    #[error("backend error")]
    Backend(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GatewayError {
    /// Wrap a driver-level failure.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        Self::Backend(err.into())
    }

    pub fn bad_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn bad_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadParam {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_param(name: impl Into<String>) -> Self {
        Self::MissingParam { name: name.into() }
    }
}
