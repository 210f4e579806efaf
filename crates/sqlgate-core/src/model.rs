//! Logical schema model shared by every connector.

use serde::{Deserialize, Serialize};

/// A result row: column name to JSON value, in driver column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The closed set of logical column types.
///
/// Every dialect-specific type a connector encounters is mapped into one of
/// these; unknown types fall back to `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Datetime,
    Array,
    Object,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
            ColumnType::Array => "array",
            ColumnType::Object => "object",
        }
    }

    /// JSON-Schema type for this logical type.
    ///
    /// `datetime` has no JSON-Schema primitive; it maps to a string with a
    /// `date-time` format (see [`ColumnType::json_schema_format`]).
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            ColumnType::String | ColumnType::Datetime => "string",
            ColumnType::Number => "number",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Array => "array",
            ColumnType::Object => "object",
        }
    }

    pub fn json_schema_format(&self) -> Option<&'static str> {
        match self {
            ColumnType::Datetime => Some("date-time"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema information for a single output or table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
        }
    }
}

/// A discovered table with its columns and an approximate row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnSchema>,

    #[serde(default)]
    pub row_count: u64,
}
