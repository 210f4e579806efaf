//! Snowflake connector.
//!
//! There is no native Rust driver for Snowflake, so this connector speaks
//! the Snowflake SQL REST API (`/api/v2/statements`) over HTTPS with an
//! OAuth bearer token. Named placeholders are rewritten to `?` bindings,
//! which the API takes as a positional binding map.
//!
//! Snowflake normalizes unquoted identifiers to upper case; discovery
//! filters match case-insensitively against that canonical form. Dropped
//! and external tables are excluded from discovery.

use crate::base::{assert_readonly_allowed, decode_connection};
use crate::{Connector, ConnectorInfo};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlgate_core::placeholder::{rewrite_placeholders, PlaceholderStyle};
use sqlgate_core::{
    coerce_params, ColumnSchema, ColumnType, Endpoint, GatewayError, GatewayResult, ParamValue,
    Row, Table,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DOCS: &str = "Snowflake connection: a DSN such as \
`user:token@account/database/schema?warehouse=WH&role=ROLE`, or a mapping \
with `account`, `user`, `token`, `database`, `schema`, `warehouse`, `role` \
and `is_readonly`. Authentication uses an OAuth bearer token.";

/// Connection configuration for Snowflake.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnowflakeConfig {
    pub account: String,
    pub user: String,
    pub token: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: String,
    pub conn_string: String,
    pub is_readonly: bool,
}

impl SnowflakeConfig {
    /// Fold a DSN of the form `user:token@account/database/schema?warehouse=..&role=..`
    /// into the individual fields. Explicit fields win over DSN components.
    pub fn resolve(mut self) -> GatewayResult<Self> {
        if self.conn_string.is_empty() {
            return Ok(self);
        }
        let dsn = self.conn_string.clone();
        let (creds, rest) = dsn
            .split_once('@')
            .ok_or_else(|| GatewayError::bad_config("database.connection", "snowflake DSN must contain '@'"))?;

        if let Some((user, token)) = creds.split_once(':') {
            if self.user.is_empty() {
                self.user = user.to_string();
            }
            if self.token.is_empty() {
                self.token = token.to_string();
            }
        } else if self.user.is_empty() {
            self.user = creds.to_string();
        }

        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut parts = path.split('/');
        if let Some(account) = parts.next() {
            if self.account.is_empty() {
                self.account = account.to_string();
            }
        }
        if let Some(database) = parts.next() {
            if self.database.is_empty() {
                self.database = database.to_string();
            }
        }
        if let Some(schema) = parts.next() {
            if self.schema.is_empty() {
                self.schema = schema.to_string();
            }
        }
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            if let Some((key, value)) = pair.split_once('=') {
                match key {
                    "warehouse" if self.warehouse.is_empty() => self.warehouse = value.to_string(),
                    "role" if self.role.is_empty() => self.role = value.to_string(),
                    _ => {}
                }
            }
        }

        if self.account.is_empty() {
            return Err(GatewayError::bad_config(
                "database.connection",
                "snowflake account is required",
            ));
        }
        Ok(self)
    }

    fn base_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com", self.account)
    }
}

/// Registry factory for `type: snowflake`.
pub fn factory(connection: &serde_yaml::Value) -> GatewayResult<Arc<dyn Connector>> {
    let config: SnowflakeConfig = decode_connection(connection, |dsn| SnowflakeConfig {
        conn_string: dsn,
        ..Default::default()
    })?;
    Ok(Arc::new(SnowflakeConnector::open(config)?))
}

pub struct SnowflakeConnector {
    config: SnowflakeConfig,
    http: reqwest::Client,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Option<Vec<Vec<Option<Value>>>>,
    #[serde(default)]
    message: Option<String>,
}

impl SnowflakeConnector {
    pub fn open(config: SnowflakeConfig) -> GatewayResult<Self> {
        let config = config.resolve()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(GatewayError::backend)?;
        Ok(Self {
            config,
            http,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> GatewayResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }
        Ok(())
    }

    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn qualified(&self, table: &str) -> String {
        format!(
            "{}.{}.{}",
            Self::quote_ident(&self.config.database),
            Self::quote_ident(&self.config.schema),
            Self::quote_ident(table)
        )
    }

    async fn execute_sql(
        &self,
        statement: &str,
        bindings: Option<Value>,
    ) -> GatewayResult<StatementResponse> {
        let mut body = json!({
            "statement": statement,
            "timeout": 60,
            "database": self.config.database,
            "schema": self.config.schema,
        });
        if !self.config.warehouse.is_empty() {
            body["warehouse"] = json!(self.config.warehouse);
        }
        if !self.config.role.is_empty() {
            body["role"] = json!(self.config.role);
        }
        if let Some(bindings) = bindings {
            body["bindings"] = bindings;
        }

        let url = format!("{}/api/v2/statements?async=false", self.config.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;

        let status = response.status();
        let parsed: StatementResponse = response.json().await.map_err(GatewayError::backend)?;

        if !status.is_success() {
            let message = parsed.message.unwrap_or_else(|| status.to_string());
            if message.to_lowercase().contains("read-only")
                || message.to_lowercase().contains("readonly")
            {
                return Err(GatewayError::Readonly);
            }
            return Err(GatewayError::backend(anyhow::anyhow!(
                "snowflake statement failed: {message}"
            )));
        }
        Ok(parsed)
    }

    fn bindings_from(
        order: &[String],
        coerced: &BTreeMap<String, ParamValue>,
    ) -> GatewayResult<Value> {
        let mut bindings = serde_json::Map::new();
        for (idx, name) in order.iter().enumerate() {
            let value = coerced
                .get(name)
                .ok_or_else(|| GatewayError::missing_param(name))?;
            let (ty, rendered) = match value {
                ParamValue::Null => ("TEXT", Value::Null),
                ParamValue::Bool(b) => ("BOOLEAN", Value::String(b.to_string())),
                ParamValue::Int(i) => ("FIXED", Value::String(i.to_string())),
                ParamValue::Float(f) => ("REAL", Value::String(f.to_string())),
                ParamValue::Text(s) => ("TEXT", Value::String(s.clone())),
                ParamValue::Timestamp(ts) => ("TIMESTAMP_TZ", Value::String(ts.to_rfc3339())),
                ParamValue::Json(v) => ("TEXT", Value::String(v.to_string())),
            };
            bindings.insert(
                (idx + 1).to_string(),
                json!({"type": ty, "value": rendered}),
            );
        }
        Ok(Value::Object(bindings))
    }

    fn rows_from(&self, response: &StatementResponse) -> Vec<Row> {
        let row_types = response
            .result_set_meta_data
            .as_ref()
            .map(|m| m.row_type.as_slice())
            .unwrap_or(&[]);
        let data = response.data.as_deref().unwrap_or(&[]);

        data.iter()
            .map(|raw_row| {
                let mut row = Row::new();
                for (idx, ty) in row_types.iter().enumerate() {
                    let cell = raw_row.get(idx).cloned().flatten();
                    row.insert(ty.name.clone(), convert_cell(cell, ty));
                }
                row
            })
            .collect()
    }

    fn columns_from(&self, response: &StatementResponse) -> Vec<ColumnSchema> {
        response
            .result_set_meta_data
            .as_ref()
            .map(|m| {
                m.row_type
                    .iter()
                    .map(|ty| ColumnSchema::new(&ty.name, logical_type(ty)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Logical type of one result column, honoring NUMBER scale.
fn logical_type(ty: &RowType) -> ColumnType {
    let upper = ty.column_type.to_uppercase();
    if upper == "FIXED" || upper == "NUMBER" {
        return match ty.scale {
            Some(0) | None => ColumnType::Integer,
            Some(_) => ColumnType::Number,
        };
    }
    guess_snowflake_type(&ty.column_type)
}

/// Dialect type-name mapping; total, unknown names fall back to string.
fn guess_snowflake_type(sql_type: &str) -> ColumnType {
    let upper = sql_type.to_uppercase();

    if upper.contains("ARRAY") {
        return ColumnType::Array;
    }
    if upper.contains("OBJECT") || upper.contains("VARIANT") {
        return ColumnType::Object;
    }
    match upper.as_str() {
        "VARCHAR" | "CHAR" | "CHARACTER" | "STRING" | "TEXT" | "BINARY" | "VARBINARY" => {
            return ColumnType::String
        }
        "NUMBER" | "DECIMAL" | "NUMERIC" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "REAL"
        | "FIXED" => return ColumnType::Number,
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" => {
            return ColumnType::Integer
        }
        "BOOLEAN" => return ColumnType::Boolean,
        "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" | "TIMESTAMP_LTZ" | "TIMESTAMP_NTZ"
        | "TIMESTAMP_TZ" => return ColumnType::Datetime,
        _ => {}
    }
    if let Some(args) = upper.strip_prefix("NUMBER(") {
        return if args.contains(',') && !args.trim_end_matches(')').ends_with(",0") {
            ColumnType::Number
        } else {
            ColumnType::Integer
        };
    }
    ColumnType::String
}

/// Convert one SQL API cell into JSON according to its column metadata.
///
/// The API delivers every value as text; numbers, booleans and semi-structured
/// values are re-typed here.
fn convert_cell(cell: Option<Value>, ty: &RowType) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    let text = match &cell {
        Value::String(s) => s.clone(),
        other => return other.clone(),
    };

    match logical_type(ty) {
        ColumnType::Integer => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        ColumnType::Number => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        ColumnType::Boolean => match text.as_str() {
            "true" | "TRUE" | "1" => Value::Bool(true),
            "false" | "FALSE" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        ColumnType::Array | ColumnType::Object => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        ColumnType::Datetime | ColumnType::String => Value::String(text),
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    fn info(&self) -> ConnectorInfo {
        ConnectorInfo {
            backend: "snowflake".to_string(),
            readonly: self.config.is_readonly,
            docs: DOCS.to_string(),
            extra_prompt: Vec::new(),
        }
    }

    async fn ping(&self) -> GatewayResult<()> {
        self.ensure_open()?;
        self.execute_sql("SELECT 1", None).await?;
        Ok(())
    }

    async fn discovery(&self, tables: Option<&[String]>) -> GatewayResult<Vec<Table>> {
        self.ensure_open()?;
        let statement = format!(
            "SHOW TABLES IN SCHEMA {}.{}",
            Self::quote_ident(&self.config.database),
            Self::quote_ident(&self.config.schema)
        );
        let response = self.execute_sql(&statement, None).await?;
        let rows = self.rows_from(&response);

        let wanted: Option<Vec<String>> =
            tables.map(|list| list.iter().map(|t| t.to_uppercase()).collect());

        let mut out = Vec::new();
        for row in rows {
            let Some(name) = row.get("name").and_then(|v| v.as_str()).map(String::from) else {
                continue;
            };
            // SHOW TABLES reports dropped and external tables; skip both
            if row
                .get("dropped_on")
                .map(|v| !v.is_null() && v.as_str() != Some(""))
                .unwrap_or(false)
            {
                continue;
            }
            if row.get("is_external").and_then(|v| v.as_str()) == Some("Y") {
                continue;
            }
            if let Some(wanted) = &wanted {
                if !wanted.contains(&name.to_uppercase()) {
                    continue;
                }
            }

            let columns = self.load_columns(&name).await?;
            let mut row_count = row
                .get("rows")
                .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .unwrap_or(0);
            if row_count == 0 {
                let count_sql = format!("SELECT COUNT(*) AS CNT FROM {}", self.qualified(&name));
                let count_resp = self.execute_sql(&count_sql, None).await?;
                row_count = self
                    .rows_from(&count_resp)
                    .first()
                    .and_then(|r| r.get("CNT"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
            }

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
        let statement = format!("SELECT * FROM {} LIMIT 5", self.qualified(&table.name));
        let response = self.execute_sql(&statement, None).await?;
        Ok(self.rows_from(&response))
    }

    async fn load_columns(&self, table: &str) -> GatewayResult<Vec<ColumnSchema>> {
        self.ensure_open()?;
        let statement = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, NUMERIC_SCALE \
             FROM {}.information_schema.columns \
             WHERE table_name = ? AND table_schema = ? \
             ORDER BY ORDINAL_POSITION",
            Self::quote_ident(&self.config.database)
        );
        let bindings = json!({
            "1": {"type": "TEXT", "value": table},
            "2": {"type": "TEXT", "value": self.config.schema},
        });
        let response = self.execute_sql(&statement, Some(bindings)).await?;

        let mut columns = Vec::new();
        for row in self.rows_from(&response) {
            let Some(name) = row.get("COLUMN_NAME").and_then(|v| v.as_str()) else {
                continue;
            };
            let data_type = row
                .get("DATA_TYPE")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let scale = row.get("NUMERIC_SCALE").and_then(|v| v.as_i64());

            let mut column_type = self.guess_column_type(data_type);
            if data_type.eq_ignore_ascii_case("NUMBER") && scale == Some(0) {
                column_type = ColumnType::Integer;
            }
            columns.push(ColumnSchema::new(name, column_type));
        }

        // SHOW PRIMARY KEYS is advisory; any failure leaves primary_key unset
        let pk_statement = format!("SHOW PRIMARY KEYS IN TABLE {}", self.qualified(table));
        if let Ok(pk_response) = self.execute_sql(&pk_statement, None).await {
            for row in self.rows_from(&pk_response) {
                if let Some(pk_column) = row.get("column_name").and_then(|v| v.as_str()) {
                    if let Some(column) = columns.iter_mut().find(|c| c.name == pk_column) {
                        column.primary_key = true;
                    }
                }
            }
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
        let bindings = if order.is_empty() {
            None
        } else {
            Some(Self::bindings_from(&order, &coerced)?)
        };
        let response = self.execute_sql(&sql, bindings).await?;
        Ok(self.rows_from(&response))
    }

    async fn infer_result_columns(&self, query: &str) -> GatewayResult<Vec<ColumnSchema>> {
        self.ensure_open()?;
        let probe = format!(
            "SELECT * FROM ({}) AS probe LIMIT 0",
            query.trim_end_matches(';')
        );
        let response = self.execute_sql(&probe, None).await?;
        Ok(self.columns_from(&response))
    }

    fn guess_column_type(&self, sql_type: &str) -> ColumnType {
        guess_snowflake_type(sql_type)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
