//! Tool registry and endpoint-to-tool derivation.

use crate::protocol::ToolDefinition;
use serde_json::{json, Value};
use sqlgate_core::{Endpoint, EndpointParam};

/// Registry of advertised tools, in installation order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: ToolDefinition) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name == tool.name) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Derive the advertised tool for an endpoint.
///
/// The description is the endpoint's `description`, verbatim.
pub fn tool_from_endpoint(endpoint: &Endpoint) -> ToolDefinition {
    ToolDefinition {
        name: endpoint.mcp_tool_name(),
        description: Some(endpoint.description.clone()),
        input_schema: input_schema_for(&endpoint.params),
    }
}

/// JSON-Schema (draft 7) object schema for a parameter list.
pub fn input_schema_for(params: &[EndpointParam]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in params {
        let mut schema = serde_json::Map::new();
        schema.insert(
            "type".to_string(),
            json!(param.param_type.json_schema_type()),
        );
        if let Some(format) = param.param_type.json_schema_format() {
            schema.insert("format".to_string(), json!(format));
        }
        if let Some(default) = &param.default {
            schema.insert("default".to_string(), default.clone());
        }
        properties.insert(param.name.clone(), Value::Object(schema));

        if param.required {
            required.push(json!(param.name));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::{ColumnType, ParamLocation};

    fn param(name: &str, ty: ColumnType, required: bool) -> EndpointParam {
        EndpointParam {
            name: name.into(),
            param_type: ty,
            location: ParamLocation::Query,
            required,
            default: None,
        }
    }

    #[test]
    fn test_tool_description_is_verbatim() {
        let endpoint = Endpoint {
            mcp_method: "test_method".into(),
            description: "sample description".into(),
            query: "SELECT 1".into(),
            params: vec![param("id", ColumnType::String, false)],
            ..Default::default()
        };
        let tool = tool_from_endpoint(&endpoint);

        assert_eq!(tool.name, "test_method");
        assert_eq!(tool.description.as_deref(), Some("sample description"));
        assert_eq!(
            tool.input_schema,
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": [],
            })
        );
    }

    #[test]
    fn test_input_schema_types_and_required() {
        let params = vec![
            param("id", ColumnType::Integer, true),
            param("since", ColumnType::Datetime, false),
            param("tags", ColumnType::Array, false),
        ];
        let schema = input_schema_for(&params);

        assert_eq!(schema["properties"]["id"]["type"], "integer");
        assert_eq!(schema["properties"]["since"]["type"], "string");
        assert_eq!(schema["properties"]["since"]["format"], "date-time");
        assert_eq!(schema["properties"]["tags"]["type"], "array");
        assert_eq!(schema["required"], json!(["id"]));
    }

    #[test]
    fn test_default_is_advertised() {
        let mut limit = param("limit", ColumnType::Integer, false);
        limit.default = Some(json!(10));
        let schema = input_schema_for(&[limit]);
        assert_eq!(schema["properties"]["limit"]["default"], json!(10));
    }

    #[test]
    fn test_registry_replaces_by_name_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDefinition {
            name: "a".into(),
            description: Some("first".into()),
            input_schema: json!({}),
        });
        registry.register(ToolDefinition {
            name: "b".into(),
            description: None,
            input_schema: json!({}),
        });
        registry.register(ToolDefinition {
            name: "a".into(),
            description: Some("second".into()),
            input_schema: json!({}),
        });

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list()[0].description.as_deref(), Some("second"));
        assert_eq!(registry.list()[1].name, "b");
    }
}
