//! SQLite connector.
//!
//! File-backed or in-memory. Discovery reads `sqlite_master`, columns and
//! primary keys come from `PRAGMA table_info`, row counts from `COUNT(*)`
//! (SQLite has no cheaper metadata path).

use crate::base::{assert_readonly_allowed, decode_connection, map_sqlx_error, probe_result_columns};
use crate::{Connector, ConnectorInfo};
use async_trait::async_trait;
use serde::Deserialize;
use sqlgate_core::placeholder::{rewrite_placeholders, PlaceholderStyle};
use sqlgate_core::{
    coerce_params, ColumnSchema, ColumnType, Endpoint, GatewayError, GatewayResult, ParamValue,
    Row, Table,
};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DOCS: &str = "SQLite connection: a DSN such as `sqlite:data.db` or `sqlite::memory:`, \
or a mapping with `path` and `is_readonly`.";

/// Connection configuration for SQLite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqliteConfig {
    pub path: String,
    pub conn_string: String,
    pub is_readonly: bool,
}

impl SqliteConfig {
    pub fn make_dsn(&self) -> GatewayResult<String> {
        if !self.conn_string.is_empty() {
            return Ok(self.conn_string.clone());
        }
        if !self.path.is_empty() {
            return Ok(format!("sqlite:{}", self.path));
        }
        Err(GatewayError::bad_config(
            "database.connection",
            "sqlite requires conn_string or path",
        ))
    }
}

/// Registry factory for `type: sqlite`.
pub fn factory(connection: &serde_yaml::Value) -> GatewayResult<Arc<dyn Connector>> {
    let config: SqliteConfig = decode_connection(connection, |dsn| SqliteConfig {
        conn_string: dsn,
        ..Default::default()
    })?;
    Ok(Arc::new(SqliteConnector::open(config)?))
}

pub struct SqliteConnector {
    config: SqliteConfig,
    pool: SqlitePool,
    closed: AtomicBool,
}

impl SqliteConnector {
    pub fn open(config: SqliteConfig) -> GatewayResult<Self> {
        let dsn = config.make_dsn()?;
        let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(&dsn)
            .map_err(|e| GatewayError::bad_config("database.connection", e.to_string()))?;
        if config.is_readonly && !in_memory {
            options = options.read_only(true);
        }

        // an in-memory database exists per connection; a pool of one keeps it
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options);

        Ok(Self {
            config,
            pool,
            closed: AtomicBool::new(false),
        })
    }

    /// Build a connector around an existing pool, for embedding.
    pub fn from_pool(pool: SqlitePool, is_readonly: bool) -> Self {
        Self {
            config: SqliteConfig {
                is_readonly,
                ..Default::default()
            },
            pool,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> GatewayResult<()> {
        if self.closed.load(Ordering::Acquire) || self.pool.is_closed() {
            return Err(GatewayError::Closed);
        }
        Ok(())
    }

    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    async fn row_count(&self, table: &str) -> GatewayResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Self::quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q ParamValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        ParamValue::Null => query.bind(None::<String>),
        ParamValue::Bool(b) => query.bind(*b),
        ParamValue::Int(i) => query.bind(*i),
        ParamValue::Float(f) => query.bind(*f),
        ParamValue::Text(s) => query.bind(s.as_str()),
        // SQLite has no native datetime or JSON storage class; bind text
        ParamValue::Timestamp(ts) => query.bind(ts.to_rfc3339()),
        ParamValue::Json(v) => query.bind(v.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> GatewayResult<Row> {
    let mut out = Row::new();
    for (idx, col) in row.columns().iter().enumerate() {
        out.insert(col.name().to_string(), decode_value(row, idx)?);
    }
    Ok(out)
}

/// Decode by the value's runtime storage class; SQLite columns are
/// dynamically typed so the declared type is only a hint.
fn decode_value(row: &SqliteRow, idx: usize) -> GatewayResult<serde_json::Value> {
    use base64::Engine as _;

    let raw = row.try_get_raw(idx).map_err(map_sqlx_error)?;
    if raw.is_null() {
        return Ok(serde_json::Value::Null);
    }
    let storage = raw.type_info().name().to_uppercase();

    let value = match storage.as_str() {
        "INTEGER" | "INT4" | "INT8" => {
            serde_json::Value::from(row.try_get::<i64, _>(idx).map_err(map_sqlx_error)?)
        }
        "REAL" => {
            let f = row.try_get::<f64, _>(idx).map_err(map_sqlx_error)?;
            serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)
        }
        "BOOLEAN" => serde_json::Value::Bool(row.try_get::<bool, _>(idx).map_err(map_sqlx_error)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(idx).map_err(map_sqlx_error)?;
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        _ => serde_json::Value::String(row.try_get::<String, _>(idx).map_err(map_sqlx_error)?),
    };
    Ok(value)
}

#[async_trait]
impl Connector for SqliteConnector {
    fn info(&self) -> ConnectorInfo {
        ConnectorInfo {
            backend: "sqlite".to_string(),
            readonly: self.config.is_readonly,
            docs: DOCS.to_string(),
            extra_prompt: Vec::new(),
        }
    }

    async fn ping(&self) -> GatewayResult<()> {
        self.ensure_open()?;
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn discovery(&self, tables: Option<&[String]>) -> GatewayResult<Vec<Table>> {
        self.ensure_open()?;
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut out = Vec::new();
        for name in names {
            if let Some(filter) = tables {
                if !filter.iter().any(|t| t.eq_ignore_ascii_case(&name)) {
                    continue;
                }
            }
            let columns = self.load_columns(&name).await?;
            let row_count = self.row_count(&name).await?;
            out.push(Table {
                name,
                columns,
                row_count,
            });
        }
        Ok(out)
    }

    async fn sample(&self, table: &Table) -> GatewayResult<Vec<Row>> {
        self.ensure_open()?;
        let sql = format!("SELECT * FROM {} LIMIT 5", Self::quote_ident(&table.name));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_json).collect()
    }

    async fn load_columns(&self, table: &str) -> GatewayResult<Vec<ColumnSchema>> {
        self.ensure_open()?;
        let sql = format!("PRAGMA table_info({})", Self::quote_ident(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(map_sqlx_error)?;
            let declared: String = row.try_get("type").map_err(map_sqlx_error)?;
            let pk: i64 = row.try_get("pk").map_err(map_sqlx_error)?;
            columns.push(ColumnSchema {
                name,
                column_type: self.guess_column_type(&declared),
                primary_key: pk > 0,
            });
        }
        Ok(columns)
    }

    async fn query(&self, endpoint: &Endpoint, raw: &Row) -> GatewayResult<Vec<Row>> {
        self.ensure_open()?;
        if self.config.is_readonly {
            assert_readonly_allowed(&endpoint.query)?;
        }
        let coerced = coerce_params(endpoint, raw)?;
        let (sql, order) = rewrite_placeholders(&endpoint.query, PlaceholderStyle::Positional);

        let mut query = sqlx::query(&sql);
        for name in &order {
            let value = coerced
                .get(name)
                .ok_or_else(|| GatewayError::missing_param(name))?;
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter().map(row_to_json).collect()
    }

    async fn infer_result_columns(&self, query: &str) -> GatewayResult<Vec<ColumnSchema>> {
        self.ensure_open()?;
        probe_result_columns(&self.pool, query, |ty| self.guess_column_type(ty)).await
    }

    fn guess_column_type(&self, sql_type: &str) -> ColumnType {
        let upper = sql_type.to_uppercase();

        if upper.starts_with("NUMERIC") || upper.starts_with("DECIMAL") {
            // DECIMAL(10,0) behaves as an integer; any other scale is a number
            if let Some(scale) = parenthesized_scale(&upper) {
                return if scale == 0 {
                    ColumnType::Integer
                } else {
                    ColumnType::Number
                };
            }
            return ColumnType::Number;
        }
        if upper.contains("INT") {
            return ColumnType::Integer;
        }
        if upper.contains("BOOL") {
            return ColumnType::Boolean;
        }
        if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            return ColumnType::Number;
        }
        if upper.contains("DATE") || upper.contains("TIME") {
            return ColumnType::Datetime;
        }
        if upper.contains("JSON") {
            return ColumnType::Object;
        }
        ColumnType::String
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.pool.close().await;
    }
}

/// Scale component of a `TYPE(p,s)` declaration, when present.
fn parenthesized_scale(declared: &str) -> Option<i64> {
    let inner = declared.split_once('(')?.1.strip_suffix(')')?;
    let scale = inner.split_once(',')?.1.trim();
    scale.parse().ok()
}
