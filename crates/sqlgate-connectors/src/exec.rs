//! Endpoint execution pipeline.
//!
//! One entry point shared by the REST and MCP surfaces: bind raw request
//! values through coercion, run the endpoint's query on the connector, and
//! shape the rowset according to `is_array_result`.

use crate::Connector;
use sqlgate_core::{Endpoint, GatewayError, GatewayResult, Row};

/// Result of executing an endpoint.
#[derive(Debug, Clone)]
pub enum EndpointResult {
    /// `is_array_result = true`: the full row sequence.
    Rows(Vec<Row>),
    /// `is_array_result = false`: the first row.
    Single(Row),
}

impl EndpointResult {
    /// Serialize for the wire: array or object per the endpoint's shape.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            EndpointResult::Rows(rows) => {
                serde_json::Value::Array(rows.into_iter().map(serde_json::Value::Object).collect())
            }
            EndpointResult::Single(row) => serde_json::Value::Object(row),
        }
    }
}

/// Execute `endpoint` with raw request values against `connector`.
///
/// Coercion happens inside [`Connector::query`]; this layer only shapes the
/// result. A single-row endpoint with an empty rowset is `NotFound`.
pub async fn execute(
    connector: &dyn Connector,
    endpoint: &Endpoint,
    raw: &Row,
) -> GatewayResult<EndpointResult> {
    let rows = connector.query(endpoint, raw).await?;

    if endpoint.is_array_result {
        return Ok(EndpointResult::Rows(rows));
    }
    match rows.into_iter().next() {
        Some(row) => Ok(EndpointResult::Single(row)),
        None => Err(GatewayError::NotFound),
    }
}
