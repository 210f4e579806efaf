//! JSON-RPC 2.0 message types for the MCP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlgate_core::GatewayError;

pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const PARSE_ERROR: i32 = -32700;

pub const SERVER_ERROR: i32 = -32000;
pub const NOT_FOUND: i32 = -32001;
pub const NOT_INITIALIZED: i32 = -32002;
pub const READONLY: i32 = -32003;

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Notifications carry no id and expect no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Tool advertised through `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One item of a tool call result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

/// Map a gateway error onto the JSON-RPC error space.
///
/// Backend detail is replaced with an opaque message; callers are expected
/// to have logged the original error.
pub fn error_response(id: Option<Value>, err: &GatewayError) -> JsonRpcResponse {
    let (code, message) = match err {
        GatewayError::MissingParam { .. } | GatewayError::BadParam { .. } => {
            (INVALID_PARAMS, err.to_string())
        }
        GatewayError::NotFound => (NOT_FOUND, err.to_string()),
        GatewayError::Readonly => (READONLY, err.to_string()),
        GatewayError::Backend(_) => (SERVER_ERROR, "backend error".to_string()),
        other => (SERVER_ERROR, other.to_string()),
    };
    JsonRpcResponse::error(id, code, message)
}
