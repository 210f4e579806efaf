//! Core types for the sqlgate gateway.
//!
//! This crate holds everything the connector, REST and MCP layers share:
//! the YAML configuration model, the closed set of logical column types,
//! the driver-boundary parameter value, request parameter coercion and the
//! gateway error taxonomy.

pub mod coerce;
pub mod config;
pub mod error;
pub mod model;
pub mod placeholder;
pub mod value;

pub use coerce::coerce_params;
pub use config::{ApiParams, DatabaseConfig, Endpoint, EndpointParam, GatewayConfig, ParamLocation};
pub use error::{GatewayError, GatewayResult};
pub use model::{ColumnSchema, ColumnType, Row, Table};
pub use value::ParamValue;
