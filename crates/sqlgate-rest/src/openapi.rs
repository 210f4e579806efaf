//! OpenAPI 3 document generation from the endpoint list.

use serde_json::{json, Map, Value};
use sqlgate_core::{ApiParams, Endpoint, EndpointParam, ParamLocation};

/// Build the OpenAPI 3 document served at `{prefix}/openapi.json`.
pub fn build_document(
    api: &ApiParams,
    endpoints: &[Endpoint],
    servers: &[String],
    prefix: &str,
) -> Value {
    let mut paths: Map<String, Value> = Map::new();
    let mut tags: Vec<String> = Vec::new();

    for endpoint in endpoints {
        if !endpoint.group.is_empty() && !tags.contains(&endpoint.group) {
            tags.push(endpoint.group.clone());
        }

        let path = format!("{}{}", prefix, endpoint.http_path);
        let method = endpoint.http_method.to_lowercase();
        let operation = operation_for(endpoint);

        let item = paths
            .entry(path)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(item) = item.as_object_mut() {
            item.insert(method, operation);
        }
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": api.name,
            "description": api.description,
            "version": api.version,
        },
        "servers": servers.iter().map(|url| json!({"url": url})).collect::<Vec<_>>(),
        "tags": tags.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
        "paths": paths,
    })
}

fn operation_for(endpoint: &Endpoint) -> Value {
    let mut operation = Map::new();
    if !endpoint.group.is_empty() {
        operation.insert("tags".into(), json!([endpoint.group]));
    }
    if !endpoint.summary.is_empty() {
        operation.insert("summary".into(), json!(endpoint.summary));
    }
    if !endpoint.description.is_empty() {
        operation.insert("description".into(), json!(endpoint.description));
    }
    operation.insert("operationId".into(), json!(endpoint.mcp_tool_name()));

    let parameters: Vec<Value> = endpoint
        .params
        .iter()
        .filter(|p| p.location != ParamLocation::Body)
        .map(parameter_for)
        .collect();
    if !parameters.is_empty() {
        operation.insert("parameters".into(), Value::Array(parameters));
    }

    let body_params: Vec<&EndpointParam> = endpoint
        .params
        .iter()
        .filter(|p| p.location == ParamLocation::Body)
        .collect();
    if !body_params.is_empty() {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &body_params {
            properties.insert(param.name.clone(), schema_for(param));
            if param.required {
                required.push(json!(param.name));
            }
        }
        operation.insert(
            "requestBody".into(),
            json!({
                "required": !required.is_empty(),
                "content": {
                    "application/json": {
                        "schema": {
                            "type": "object",
                            "properties": properties,
                            "required": required,
                        }
                    }
                }
            }),
        );
    }

    let result_schema = if endpoint.is_array_result {
        json!({"type": "array", "items": {"type": "object"}})
    } else {
        json!({"type": "object"})
    };
    operation.insert(
        "responses".into(),
        json!({
            "200": {
                "description": "Successful query",
                "content": {"application/json": {"schema": result_schema}},
            },
            "400": {"description": "Missing or invalid parameter"},
            "404": {"description": "Not found"},
            "500": {"description": "Backend failure"},
        }),
    );

    Value::Object(operation)
}

fn parameter_for(param: &EndpointParam) -> Value {
    let location = match param.location {
        ParamLocation::Path => "path",
        ParamLocation::Query => "query",
        ParamLocation::Header => "header",
        ParamLocation::Body => unreachable!("body params go through requestBody"),
    };
    json!({
        "name": param.name,
        "in": location,
        // path parameters are always required in OpenAPI
        "required": param.required || param.location == ParamLocation::Path,
        "schema": schema_for(param),
    })
}

fn schema_for(param: &EndpointParam) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!(param.param_type.json_schema_type()));
    if let Some(format) = param.param_type.json_schema_format() {
        schema.insert("format".into(), json!(format));
    }
    if let Some(default) = &param.default {
        schema.insert("default".into(), default.clone());
    }
    Value::Object(schema)
}
