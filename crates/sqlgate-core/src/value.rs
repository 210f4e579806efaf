//! Driver-boundary parameter values.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A coerced SQL parameter, ready to bind on any connector.
///
/// This is the sum type produced by [`crate::coerce_params`]; connectors only
/// ever see these variants, never the raw request JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl ParamValue {
    /// Render the value as JSON, mostly for HTTP-level drivers and logging.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            ParamValue::Json(v) => v.clone(),
        }
    }

    /// Literal text form for dialects that bind every value as a string.
    pub fn to_literal(&self) -> Option<String> {
        match self {
            ParamValue::Null => None,
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(f.to_string()),
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Timestamp(ts) => Some(ts.to_rfc3339()),
            ParamValue::Json(v) => Some(v.to_string()),
        }
    }
}
