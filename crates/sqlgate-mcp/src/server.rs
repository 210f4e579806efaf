//! MCP server: JSON-RPC state machine and tool dispatch.
//!
//! The server itself is immutable once built; per-session state is limited
//! to the initialization flag. Tools are derived from the installed
//! endpoints at startup, plus synthetic raw-protocol tools when raw mode is
//! enabled and a connector is attached.

use crate::protocol::*;
use crate::tools::{tool_from_endpoint, ToolRegistry};
use serde_json::{json, Value};
use sqlgate_connectors::{exec, Connector};
use sqlgate_core::{ApiParams, ColumnType, Endpoint, EndpointParam, GatewayError, ParamLocation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const RAW_QUERY_TOOL: &str = "raw_query";
const LIST_TABLES_TOOL: &str = "list_tables";
const DESCRIBE_QUERY_TOOL: &str = "describe_query";

/// Per-session state: `Fresh` until `initialize`, then `Initialized`.
#[derive(Default)]
pub struct SessionState {
    initialized: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }
}

/// External tool enricher: receives the server after endpoint tools are
/// installed and may register additional tools. Failures are fatal at
/// startup.
pub trait McpToolEnricher: Send + Sync {
    fn enrich(&self, server: &mut McpServer) -> anyhow::Result<()>;
}

/// Executor for a tool registered outside the endpoint list.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Value, GatewayError>;
}

/// The MCP tool server.
pub struct McpServer {
    api: ApiParams,
    tools: ToolRegistry,
    endpoints: HashMap<String, Endpoint>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    connector: Option<Arc<dyn Connector>>,
    raw_enabled: bool,
}

impl McpServer {
    pub fn new(api: ApiParams) -> Self {
        Self {
            api,
            tools: ToolRegistry::new(),
            endpoints: HashMap::new(),
            handlers: HashMap::new(),
            connector: None,
            raw_enabled: false,
        }
    }

    /// Attach the backend connector shared with the REST surface.
    pub fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        self.connector = Some(connector);
        if self.raw_enabled {
            self.install_raw_tools();
        }
    }

    /// Install one tool per endpoint. Endpoint tools always win a name
    /// collision, including against raw-protocol tools.
    pub fn set_tools(&mut self, endpoints: &[Endpoint]) {
        for endpoint in endpoints {
            let tool = tool_from_endpoint(endpoint);
            if self.tools.contains(&tool.name) {
                tracing::warn!(tool = %tool.name, "replacing previously registered tool");
            }
            self.endpoints.insert(tool.name.clone(), endpoint.clone());
            self.tools.register(tool);
        }
    }

    /// Enable the raw protocol: synthetic tools that reach the connector
    /// directly, bypassing endpoint binding. Only takes effect once a
    /// connector is attached.
    pub fn enable_raw_protocol(&mut self) {
        self.raw_enabled = true;
        if self.connector.is_some() {
            self.install_raw_tools();
        }
    }

    /// Register an additional tool with its executor; used by enrichers.
    pub fn register_tool(&mut self, tool: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(tool.name.clone(), handler);
        self.tools.register(tool);
    }

    /// Run external enrichers. Any failure aborts startup.
    pub fn enrich_with(&mut self, enrichers: &[Box<dyn McpToolEnricher>]) -> anyhow::Result<()> {
        for enricher in enrichers {
            enricher.enrich(self)?;
        }
        Ok(())
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn install_raw_tools(&mut self) {
        let raw_tools = [
            ToolDefinition {
                name: RAW_QUERY_TOOL.to_string(),
                description: Some(
                    "Execute an arbitrary SQL query with named :param placeholders. \
                     Arguments: {query, params}."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "params": {"type": "object"},
                    },
                    "required": ["query"],
                }),
            },
            ToolDefinition {
                name: LIST_TABLES_TOOL.to_string(),
                description: Some(
                    "Discover tables with columns and row counts. \
                     Optional `tables` filter matches names case-insensitively."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "tables": {"type": "array", "items": {"type": "string"}},
                    },
                    "required": [],
                }),
            },
            ToolDefinition {
                name: DESCRIBE_QUERY_TOOL.to_string(),
                description: Some(
                    "Report the output column names and types of a SQL query \
                     without running it."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"],
                }),
            },
        ];

        for tool in raw_tools {
            if self.endpoints.contains_key(&tool.name) {
                tracing::warn!(
                    tool = %tool.name,
                    "raw tool name already claimed by an endpoint, skipping"
                );
                continue;
            }
            self.tools.register(tool);
        }
    }

    /// Handle one JSON-RPC request for a session. Notifications return
    /// `None`.
    pub async fn handle_request(
        &self,
        session: &SessionState,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();

        if request.method.starts_with("notifications/") {
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                session.mark_initialized();
                self.handle_initialize(id)
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            _ if !session.is_initialized() => {
                JsonRpcResponse::error(id, NOT_INITIALIZED, "server not initialized")
            }
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params.clone()).await,
            other => {
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {other}"))
            }
        };

        if request.is_notification() {
            return None;
        }
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let instructions = self
            .connector
            .as_ref()
            .map(|c| c.info().extra_prompt.join("\n"))
            .filter(|s| !s.is_empty());

        let mut result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": self.api.name,
                "version": self.api.version,
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        if let Some(instructions) = instructions {
            result["instructions"] = json!(instructions);
        }
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.tools.list() }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {e}"))
            }
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "missing params"),
        };

        if !self.tools.contains(&params.name) {
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("tool not found: {}", params.name),
            );
        }

        let arguments = params
            .arguments
            .as_object()
            .cloned()
            .unwrap_or_default();

        let result = if let Some(handler) = self.handlers.get(&params.name) {
            handler.call(&arguments).await
        } else {
            let Some(connector) = self.connector.as_ref() else {
                return JsonRpcResponse::error(id, SERVER_ERROR, "no connector attached");
            };
            if let Some(endpoint) = self.endpoints.get(&params.name) {
                exec::execute(connector.as_ref(), endpoint, &arguments)
                    .await
                    .map(exec::EndpointResult::into_json)
            } else {
                self.call_raw_tool(connector.as_ref(), &params.name, &arguments)
                    .await
            }
        };

        match result {
            Ok(value) => wrap_tool_result(id, &value),
            Err(err) => {
                tracing::warn!(tool = %params.name, error = %err, "tool call failed");
                error_response(id, &err)
            }
        }
    }

    async fn call_raw_tool(
        &self,
        connector: &dyn Connector,
        name: &str,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<Value, GatewayError> {
        match name {
            RAW_QUERY_TOOL => {
                let query = require_str_argument(arguments, "query")?;
                let params = arguments
                    .get("params")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                let endpoint = raw_endpoint(query, &params);
                let rows = connector.query(&endpoint, &params).await?;
                Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
            }
            LIST_TABLES_TOOL => {
                let filter: Option<Vec<String>> = arguments.get("tables").map(|v| {
                    v.as_array()
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|item| item.as_str().map(String::from))
                                .collect()
                        })
                        .unwrap_or_default()
                });
                let tables = connector.discovery(filter.as_deref()).await?;
                serde_json::to_value(tables).map_err(GatewayError::backend)
            }
            DESCRIBE_QUERY_TOOL => {
                let query = require_str_argument(arguments, "query")?;
                let columns = connector.infer_result_columns(query).await?;
                serde_json::to_value(columns).map_err(GatewayError::backend)
            }
            other => Err(GatewayError::bad_param(
                "name",
                format!("tool {other} has no handler"),
            )),
        }
    }
}

fn require_str_argument<'a>(
    arguments: &'a serde_json::Map<String, Value>,
    name: &str,
) -> Result<&'a str, GatewayError> {
    arguments
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::missing_param(name))
}

/// Ad-hoc endpoint for the raw query tool: parameters are declared from the
/// shape of the supplied arguments, so coercion passes them through intact.
fn raw_endpoint(query: &str, params: &serde_json::Map<String, Value>) -> Endpoint {
    let declared = params
        .iter()
        .map(|(name, value)| EndpointParam {
            name: name.clone(),
            param_type: match value {
                Value::Bool(_) => ColumnType::Boolean,
                Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
                Value::Number(_) => ColumnType::Number,
                Value::Array(_) => ColumnType::Array,
                Value::Object(_) => ColumnType::Object,
                _ => ColumnType::String,
            },
            location: ParamLocation::Body,
            required: false,
            default: None,
        })
        .collect();

    Endpoint {
        mcp_method: RAW_QUERY_TOOL.to_string(),
        query: query.to_string(),
        is_array_result: true,
        params: declared,
        ..Default::default()
    }
}

/// Wrap a tool result in MCP content items (text JSON).
fn wrap_tool_result(id: Option<Value>, value: &Value) -> JsonRpcResponse {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    JsonRpcResponse::success(
        id,
        json!({
            "content": [{"type": "text", "text": text}],
            "isError": false,
        }),
    )
}
