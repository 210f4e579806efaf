//! Backend connectors for sqlgate.
//!
//! A [`Connector`] adapts one SQL dialect to the gateway's uniform capability
//! set: ping, schema discovery, column introspection, sampling, endpoint
//! query execution and result-column inference. Connectors are created once
//! per process through the [`registry`] and own their connection pool until
//! process exit.

pub mod base;
pub mod exec;
pub mod postgres;
pub mod registry;
pub mod snowflake;
pub mod sqlite;

use async_trait::async_trait;
use sqlgate_core::{ColumnSchema, ColumnType, Endpoint, GatewayResult, Row, Table};

/// Static facts about a connector instance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectorInfo {
    /// Registry key of the backend ("postgres", "sqlite", "snowflake").
    pub backend: String,
    /// Whether mutating statements are rejected.
    pub readonly: bool,
    /// Short operator-facing documentation for the connection shape.
    pub docs: String,
    /// Extra prompt lines surfaced to AI agents alongside the tool list.
    pub extra_prompt: Vec<String>,
}

/// Uniform capability set every backend provides.
///
/// All methods are plain async fns: dropping the caller's future cancels the
/// underlying driver I/O, and a process-level graceful shutdown drops every
/// request task. After [`Connector::close`] every operation fails with
/// `GatewayError::Closed`.
#[async_trait]
pub trait Connector: Send + Sync {
    fn info(&self) -> ConnectorInfo;

    /// Verify the backend is reachable.
    async fn ping(&self) -> GatewayResult<()>;

    /// List tables with columns and row counts.
    ///
    /// When `tables` is given, matching is case-insensitive on the table name
    /// after normalizing to the dialect's canonical case; dropped and
    /// external tables are excluded.
    async fn discovery(&self, tables: Option<&[String]>) -> GatewayResult<Vec<Table>>;

    /// Up to five example rows from a table.
    async fn sample(&self, table: &Table) -> GatewayResult<Vec<Row>>;

    /// Column schemas for one table, with primary-key annotation where the
    /// dialect exposes it. PK detection is advisory: introspection failures
    /// degrade to `primary_key = false`.
    async fn load_columns(&self, table: &str) -> GatewayResult<Vec<ColumnSchema>>;

    /// Execute an endpoint query. Raw request values are coerced against the
    /// endpoint's declared parameters before any placeholder is bound.
    async fn query(&self, endpoint: &Endpoint, raw: &Row) -> GatewayResult<Vec<Row>>;

    /// Output column names and logical types of a query, without fetching
    /// any rows.
    async fn infer_result_columns(&self, query: &str) -> GatewayResult<Vec<ColumnSchema>>;

    /// Map a dialect type name to a logical type. Total: unknown names fall
    /// back to [`ColumnType::String`].
    fn guess_column_type(&self, sql_type: &str) -> ColumnType;

    /// Close the underlying pool. Later operations fail with `Closed`.
    async fn close(&self);
}
