//! REST surface for sqlgate.
//!
//! Builds an axum router from the installed endpoint list: one route per
//! endpoint, an OpenAPI 3 document at `{prefix}/openapi.json`, Swagger UI at
//! `{prefix}/` and, in raw mode, a unified `POST {prefix}/raw` envelope for
//! AI agents.

pub mod openapi;
mod swagger;

use axum::body::Bytes;
use axum::extract::{Query, RawPathParams, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, on, post, MethodFilter};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use sqlgate_connectors::{exec, Connector};
use sqlgate_core::{
    Endpoint, GatewayConfig, GatewayError, GatewayResult, ParamLocation, Row,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Options controlling which auxiliary routes are installed.
#[derive(Debug, Clone, Default)]
pub struct RestOptions {
    pub disable_swagger: bool,
    pub raw_mode: bool,
    /// Server URLs advertised in the OpenAPI document.
    pub servers: Vec<String>,
}

/// REST API generator for one gateway config.
pub struct RestApi {
    api: sqlgate_core::ApiParams,
    endpoints: Vec<Endpoint>,
    connector: Arc<dyn Connector>,
    prefix: String,
}

/// Shared state for the raw envelope route.
struct RawState {
    connector: Arc<dyn Connector>,
    endpoints_by_tool: HashMap<String, Endpoint>,
}

impl RestApi {
    pub fn new(
        config: &GatewayConfig,
        connector: Arc<dyn Connector>,
        prefix: &str,
    ) -> GatewayResult<Self> {
        let endpoints = config.database.all_endpoints();
        for endpoint in &endpoints {
            endpoint.validate()?;
            method_filter(&endpoint.http_method)?;
        }
        Ok(Self {
            api: config.api.clone(),
            endpoints,
            connector,
            prefix: normalize_prefix(prefix),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the router with all endpoint routes and auxiliary pages.
    pub fn router(&self, options: &RestOptions) -> Router {
        let mut router = Router::new();

        for endpoint in &self.endpoints {
            let path = format!("{}{}", self.prefix, endpoint.http_path);
            // validated in new()
            let Ok(filter) = method_filter(&endpoint.http_method) else {
                continue;
            };
            let endpoint = Arc::new(endpoint.clone());
            let connector = self.connector.clone();

            let handler = move |paths: RawPathParams,
                                Query(query): Query<HashMap<String, String>>,
                                headers: HeaderMap,
                                body: Bytes| {
                let endpoint = endpoint.clone();
                let connector = connector.clone();
                async move { serve_endpoint(connector, endpoint, paths, query, headers, body).await }
            };
            router = router.route(&path, on(filter, handler));
        }

        let document = Arc::new(openapi::build_document(
            &self.api,
            &self.endpoints,
            &options.servers,
            &self.prefix,
        ));
        router = router.route(
            &format!("{}/openapi.json", self.prefix),
            get(move || {
                let document = document.clone();
                async move { Json(document.as_ref().clone()) }
            }),
        );

        router = router.route(
            &format!("{}/health", self.prefix),
            get(|| async {
                Json(serde_json::json!({
                    "status": "ok",
                    "service": "sqlgate",
                    "version": env!("CARGO_PKG_VERSION"),
                }))
            }),
        );

        if !options.disable_swagger {
            let index = if self.prefix.is_empty() {
                "/".to_string()
            } else {
                format!("{}/", self.prefix)
            };
            router = router.route(&index, get(|| async { Html(swagger::INDEX_HTML) }));
        }

        if options.raw_mode {
            let state = Arc::new(RawState {
                connector: self.connector.clone(),
                endpoints_by_tool: self
                    .endpoints
                    .iter()
                    .map(|e| (e.mcp_tool_name(), e.clone()))
                    .collect(),
            });
            router = router.route(
                &format!("{}/raw", self.prefix),
                post(serve_raw).with_state(state),
            );
        }

        router
    }
}

/// `""` or `/prefix` with a single leading slash and no trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn method_filter(method: &str) -> GatewayResult<MethodFilter> {
    match method.to_uppercase().as_str() {
        "GET" => Ok(MethodFilter::GET),
        "POST" => Ok(MethodFilter::POST),
        "PUT" => Ok(MethodFilter::PUT),
        "DELETE" => Ok(MethodFilter::DELETE),
        "PATCH" => Ok(MethodFilter::PATCH),
        "HEAD" => Ok(MethodFilter::HEAD),
        "OPTIONS" => Ok(MethodFilter::OPTIONS),
        other => Err(GatewayError::bad_config(
            "endpoints.http_method",
            format!("unsupported HTTP method {other}"),
        )),
    }
}

/// Bind request values by declared location and run the execution pipeline.
async fn serve_endpoint(
    connector: Arc<dyn Connector>,
    endpoint: Arc<Endpoint>,
    paths: RawPathParams,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body_json: Option<Value> = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return Err(ApiError(GatewayError::bad_param(
                    "body",
                    format!("invalid JSON body: {e}"),
                )))
            }
        }
    };

    let mut raw = Row::new();
    for param in &endpoint.params {
        let value: Option<Value> = match param.location {
            ParamLocation::Path => paths
                .iter()
                .find(|(name, _)| *name == param.name)
                .map(|(_, value)| Value::String(value.to_string())),
            ParamLocation::Query => query.get(&param.name).cloned().map(Value::String),
            ParamLocation::Header => headers
                .get(param.name.as_str())
                .and_then(|value| value.to_str().ok())
                .map(|value| Value::String(value.to_string())),
            ParamLocation::Body => body_json
                .as_ref()
                .and_then(|body| body.get(&param.name))
                .cloned(),
        };
        if let Some(value) = value {
            raw.insert(param.name.clone(), value);
        }
    }

    let result = exec::execute(connector.as_ref(), &endpoint, &raw).await?;
    Ok(Json(result.into_json()))
}

/// Unified raw envelope: `{endpoint, params}` dispatched by tool name.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    endpoint: String,
    #[serde(default)]
    params: Value,
}

async fn serve_raw(
    State(state): State<Arc<RawState>>,
    Json(envelope): Json<RawEnvelope>,
) -> Result<Json<Value>, ApiError> {
    let Some(endpoint) = state.endpoints_by_tool.get(&envelope.endpoint) else {
        return Err(ApiError(GatewayError::NotFound));
    };
    let raw = envelope.params.as_object().cloned().unwrap_or_default();
    let result = exec::execute(state.connector.as_ref(), endpoint, &raw).await?;
    Ok(Json(result.into_json()))
}

/// Gateway error with its HTTP mapping. Backend detail is logged, the
/// response body stays opaque.
struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            GatewayError::MissingParam { .. } | GatewayError::BadParam { .. } => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            GatewayError::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            GatewayError::Readonly => (StatusCode::FORBIDDEN, self.0.to_string()),
            other => {
                tracing::warn!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("api"), "/api");
        assert_eq!(normalize_prefix("/api/"), "/api");
    }

    #[test]
    fn test_method_filter_rejects_garbage() {
        assert!(method_filter("GET").is_ok());
        assert!(method_filter("delete").is_ok());
        assert!(method_filter("FETCH").is_err());
    }
}
