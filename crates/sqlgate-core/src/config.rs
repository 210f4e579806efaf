//! Gateway configuration model.
//!
//! Configuration is loaded once from a YAML file at startup and is immutable
//! for the process lifetime. The `database.connection` node is intentionally
//! left opaque here (`serde_yaml::Value`): only the connector registered for
//! `database.type` is allowed to interpret it.

use crate::error::{GatewayError, GatewayResult};
use crate::model::ColumnType;
use crate::placeholder::extract_placeholders;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Complete gateway configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    /// API metadata surfaced in the OpenAPI document and MCP server info.
    #[serde(default)]
    pub api: ApiParams,

    /// The single backing database and its endpoints.
    pub database: DatabaseConfig,

    /// Opaque plugin configuration, handed to external enrichers.
    #[serde(default)]
    pub plugins: HashMap<String, serde_yaml::Value>,
}

/// API metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiParams {
    #[serde(default = "default_api_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_api_version")]
    pub version: String,
}

impl Default for ApiParams {
    fn default() -> Self {
        Self {
            name: default_api_name(),
            description: String::new(),
            version: default_api_version(),
        }
    }
}

fn default_api_name() -> String {
    "sqlgate API".to_string()
}

fn default_api_version() -> String {
    "0.0.1".to_string()
}

/// Backend database configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Connector registry key ("postgres", "sqlite", "snowflake", ...).
    #[serde(rename = "type")]
    pub backend: String,

    /// Either a DSN scalar or a connector-specific mapping. Decoded by the
    /// connector, nowhere else.
    #[serde(default)]
    pub connection: serde_yaml::Value,

    /// Declared endpoints, in file order.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl DatabaseConfig {
    /// All endpoints to install, order-preserving and deduplicated by
    /// `(http_method, http_path)` with last declaration winning.
    pub fn all_endpoints(&self) -> Vec<Endpoint> {
        let mut out: Vec<Endpoint> = Vec::with_capacity(self.endpoints.len());
        for ep in &self.endpoints {
            let key = (ep.http_method.to_uppercase(), ep.http_path.clone());
            if let Some(existing) = out
                .iter_mut()
                .find(|e| (e.http_method.to_uppercase(), e.http_path.clone()) == key)
            {
                *existing = ep.clone();
            } else {
                out.push(ep.clone());
            }
        }
        out
    }
}

/// Where an endpoint parameter is read from on the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    #[default]
    Query,
    Body,
    Header,
}

/// A declared endpoint parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointParam {
    pub name: String,

    #[serde(rename = "type", default)]
    pub param_type: ColumnType,

    #[serde(default)]
    pub location: ParamLocation,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// A declarative binding of an HTTP or MCP entry point to a SQL statement
/// with `:name` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Endpoint {
    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub http_method: String,

    #[serde(default)]
    pub http_path: String,

    #[serde(default)]
    pub mcp_method: String,

    pub query: String,

    #[serde(default)]
    pub is_array_result: bool,

    #[serde(default)]
    pub params: Vec<EndpointParam>,
}

impl Endpoint {
    /// Tool name used on the MCP surface: the declared `mcp_method`, or a
    /// normalized `group/http_path` when absent.
    pub fn mcp_tool_name(&self) -> String {
        if !self.mcp_method.is_empty() {
            return self.mcp_method.clone();
        }
        let raw = format!("{}_{}", self.group, self.http_path);
        let mut name = String::with_capacity(raw.len());
        let mut last_was_sep = false;
        for ch in raw.chars() {
            if ch.is_ascii_alphanumeric() {
                name.push(ch.to_ascii_lowercase());
                last_was_sep = false;
            } else if !last_was_sep && !name.is_empty() {
                name.push('_');
                last_was_sep = true;
            }
        }
        name.trim_end_matches('_').to_string()
    }

    pub fn param(&self, name: &str) -> Option<&EndpointParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Startup validation: every `:name` placeholder must be declared (or
    /// defaulted) and every path param must occur in `http_path`.
    pub fn validate(&self) -> GatewayResult<()> {
        for name in extract_placeholders(&self.query) {
            if self.param(&name).is_none() {
                return Err(GatewayError::bad_config(
                    format!("endpoints[{}].query", self.describe()),
                    format!("placeholder :{name} has no declared parameter"),
                ));
            }
        }
        for p in &self.params {
            if p.location == ParamLocation::Path {
                let marker = format!("{{{}}}", p.name);
                if !self.http_path.contains(&marker) {
                    return Err(GatewayError::bad_config(
                        format!("endpoints[{}].params.{}", self.describe(), p.name),
                        format!("path parameter not present in http_path {}", self.http_path),
                    ));
                }
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        if self.http_path.is_empty() {
            self.mcp_tool_name()
        } else {
            format!("{} {}", self.http_method, self.http_path)
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content and validate every endpoint.
    pub fn from_yaml(content: &str) -> GatewayResult<Self> {
        let config: GatewayConfig = serde_yaml::from_str(content)?;
        for ep in &config.database.endpoints {
            ep.validate()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
api:
  name: HR API
  description: Employee directory
  version: 1.2.0
database:
  type: postgres
  connection:
    host: localhost
    database: hr
  endpoints:
    - group: Employees
      http_method: GET
      http_path: /employees
      query: SELECT id, name FROM employees LIMIT :limit
      is_array_result: true
      params:
        - name: limit
          type: integer
          location: query
          default: 10
    - group: Employees
      http_method: GET
      http_path: /employees/{id}
      query: SELECT id, name FROM employees WHERE id = :id
      params:
        - name: id
          type: integer
          location: path
          required: true
"#;

    #[test]
    fn test_parse_sample_config() {
        let cfg = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.api.name, "HR API");
        assert_eq!(cfg.database.backend, "postgres");
        assert_eq!(cfg.database.endpoints.len(), 2);
        let ep = &cfg.database.endpoints[1];
        assert_eq!(ep.params[0].location, ParamLocation::Path);
        assert!(ep.params[0].required);
    }

    #[test]
    fn test_connection_accepts_scalar_dsn() {
        let yaml = r#"
database:
  type: postgres
  connection: postgres://u:p@localhost/db
"#;
        let cfg = GatewayConfig::from_yaml(yaml).unwrap();
        assert!(cfg.database.connection.is_string());
    }

    #[test]
    fn test_undeclared_placeholder_fails_validation() {
        let yaml = r#"
database:
  type: sqlite
  endpoints:
    - http_method: GET
      http_path: /items
      query: SELECT * FROM items WHERE id = :id
"#;
        let err = GatewayConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GatewayError::BadConfig { .. }));
    }

    #[test]
    fn test_path_param_must_occur_in_path() {
        let yaml = r#"
database:
  type: sqlite
  endpoints:
    - http_method: GET
      http_path: /items
      query: SELECT * FROM items WHERE id = :id
      params:
        - name: id
          type: integer
          location: path
"#;
        let err = GatewayConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GatewayError::BadConfig { .. }));
    }

    #[test]
    fn test_all_endpoints_dedupe_last_wins() {
        let mut db = DatabaseConfig {
            backend: "sqlite".into(),
            ..Default::default()
        };
        let mk = |summary: &str| Endpoint {
            http_method: "GET".into(),
            http_path: "/items".into(),
            summary: summary.into(),
            query: "SELECT 1".into(),
            ..Default::default()
        };
        db.endpoints.push(mk("first"));
        db.endpoints.push(Endpoint {
            http_path: "/other".into(),
            ..mk("other")
        });
        db.endpoints.push(mk("second"));

        let all = db.all_endpoints();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].summary, "second");
        assert_eq!(all[1].summary, "other");
    }

    #[test]
    fn test_mcp_tool_name_fallback() {
        let ep = Endpoint {
            group: "Employees".into(),
            http_method: "GET".into(),
            http_path: "/employees/{id}".into(),
            query: "SELECT 1".into(),
            ..Default::default()
        };
        assert_eq!(ep.mcp_tool_name(), "employees_employees_id");

        let named = Endpoint {
            mcp_method: "list_employees".into(),
            query: "SELECT 1".into(),
            ..Default::default()
        };
        assert_eq!(named.mcp_tool_name(), "list_employees");
    }
}
