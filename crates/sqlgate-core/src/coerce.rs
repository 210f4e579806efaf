//! Request parameter coercion.
//!
//! Raw request values (path/query/header strings, JSON body values, MCP tool
//! arguments) are coerced into typed [`ParamValue`]s according to the
//! endpoint's declared parameter schema. The resulting map is the only input
//! a connector consumes besides the SQL text.

use crate::config::Endpoint;
use crate::error::{GatewayError, GatewayResult};
use crate::model::ColumnType;
use crate::value::ParamValue;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Coerce raw request values against the endpoint's declared parameters.
///
/// The output contains exactly one entry per declared parameter:
/// - request value when present, coerced to the declared type;
/// - the declared default when absent (coerced through the same rules);
/// - `ParamValue::Null` when absent, optional and without a default.
///
/// Absent required parameters fail with [`GatewayError::MissingParam`].
/// Undeclared keys in `raw` are dropped and never reach the driver.
pub fn coerce_params(
    endpoint: &Endpoint,
    raw: &serde_json::Map<String, Value>,
) -> GatewayResult<BTreeMap<String, ParamValue>> {
    let mut out = BTreeMap::new();

    for param in &endpoint.params {
        let supplied = raw.get(&param.name).filter(|v| !v.is_null());

        let value = match (supplied, &param.default) {
            (Some(v), _) => coerce_value(&param.name, param.param_type, v)?,
            (None, Some(default)) => coerce_value(&param.name, param.param_type, default)?,
            (None, None) if param.required => {
                return Err(GatewayError::missing_param(&param.name));
            }
            (None, None) => ParamValue::Null,
        };

        out.insert(param.name.clone(), value);
    }

    Ok(out)
}

/// Coerce one raw value into the declared logical type.
pub fn coerce_value(name: &str, ty: ColumnType, raw: &Value) -> GatewayResult<ParamValue> {
    match ty {
        ColumnType::Integer => coerce_integer(name, raw),
        ColumnType::Number => coerce_number(name, raw),
        ColumnType::Boolean => coerce_boolean(name, raw),
        ColumnType::Datetime => coerce_datetime(name, raw),
        ColumnType::String => coerce_string(name, raw),
        ColumnType::Array => coerce_composite(name, raw, true),
        ColumnType::Object => coerce_composite(name, raw, false),
    }
}

fn coerce_integer(name: &str, raw: &Value) -> GatewayResult<ParamValue> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(ParamValue::Int(i));
            }
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    return Ok(ParamValue::Int(f as i64));
                }
                return Err(GatewayError::bad_param(name, "expected integer, got fractional value"));
            }
            Err(GatewayError::bad_param(name, "integer out of range"))
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| GatewayError::bad_param(name, format!("cannot parse {s:?} as integer"))),
        other => Err(GatewayError::bad_param(
            name,
            format!("expected integer, got {}", kind_of(other)),
        )),
    }
}

fn coerce_number(name: &str, raw: &Value) -> GatewayResult<ParamValue> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .map(ParamValue::Float)
            .ok_or_else(|| GatewayError::bad_param(name, "number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| GatewayError::bad_param(name, format!("cannot parse {s:?} as number"))),
        other => Err(GatewayError::bad_param(
            name,
            format!("expected number, got {}", kind_of(other)),
        )),
    }
}

fn coerce_boolean(name: &str, raw: &Value) -> GatewayResult<ParamValue> {
    match raw {
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(ParamValue::Bool(false)),
            Some(1) => Ok(ParamValue::Bool(true)),
            _ => Err(GatewayError::bad_param(name, "expected boolean, 0 or 1")),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(ParamValue::Bool(true)),
            "false" | "0" => Ok(ParamValue::Bool(false)),
            _ => Err(GatewayError::bad_param(
                name,
                format!("cannot parse {s:?} as boolean"),
            )),
        },
        other => Err(GatewayError::bad_param(
            name,
            format!("expected boolean, got {}", kind_of(other)),
        )),
    }
}

fn coerce_datetime(name: &str, raw: &Value) -> GatewayResult<ParamValue> {
    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| ParamValue::Timestamp(dt.with_timezone(&Utc)))
            .map_err(|e| GatewayError::bad_param(name, format!("invalid RFC 3339 datetime: {e}"))),
        other => Err(GatewayError::bad_param(
            name,
            format!("expected RFC 3339 datetime string, got {}", kind_of(other)),
        )),
    }
}

fn coerce_string(name: &str, raw: &Value) -> GatewayResult<ParamValue> {
    match raw {
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        Value::Number(n) => Ok(ParamValue::Text(n.to_string())),
        Value::Bool(b) => Ok(ParamValue::Text(b.to_string())),
        other => Err(GatewayError::bad_param(
            name,
            format!("expected string scalar, got {}", kind_of(other)),
        )),
    }
}

fn coerce_composite(name: &str, raw: &Value, want_array: bool) -> GatewayResult<ParamValue> {
    let structured = match raw {
        Value::String(s) => serde_json::from_str::<Value>(s)
            .map_err(|e| GatewayError::bad_param(name, format!("invalid JSON text: {e}")))?,
        other => other.clone(),
    };
    match (&structured, want_array) {
        (Value::Array(_), true) | (Value::Object(_), false) => Ok(ParamValue::Json(structured)),
        (_, true) => Err(GatewayError::bad_param(name, "expected JSON array")),
        (_, false) => Err(GatewayError::bad_param(name, "expected JSON object")),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointParam, ParamLocation};
    use serde_json::json;

    fn endpoint(params: Vec<EndpointParam>) -> Endpoint {
        Endpoint {
            query: "SELECT 1".into(),
            params,
            ..Default::default()
        }
    }

    fn param(name: &str, ty: ColumnType) -> EndpointParam {
        EndpointParam {
            name: name.into(),
            param_type: ty,
            location: ParamLocation::Query,
            required: false,
            default: None,
        }
    }

    fn raw(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_integer_accepts_numeric_and_text() {
        let ep = endpoint(vec![param("n", ColumnType::Integer)]);
        for input in [json!({"n": 42}), json!({"n": "42"}), json!({"n": 42.0})] {
            let coerced = coerce_params(&ep, &raw(input)).unwrap();
            assert_eq!(coerced["n"], ParamValue::Int(42));
        }
    }

    #[test]
    fn test_integer_rejects_fractional() {
        let ep = endpoint(vec![param("n", ColumnType::Integer)]);
        let err = coerce_params(&ep, &raw(json!({"n": 4.5}))).unwrap_err();
        assert!(matches!(err, GatewayError::BadParam { .. }));

        let err = coerce_params(&ep, &raw(json!({"n": "4.5"}))).unwrap_err();
        assert!(matches!(err, GatewayError::BadParam { .. }));
    }

    #[test]
    fn test_number_produces_float() {
        let ep = endpoint(vec![param("x", ColumnType::Number)]);
        let coerced = coerce_params(&ep, &raw(json!({"x": "2.5"}))).unwrap();
        assert_eq!(coerced["x"], ParamValue::Float(2.5));

        let coerced = coerce_params(&ep, &raw(json!({"x": 7}))).unwrap();
        assert_eq!(coerced["x"], ParamValue::Float(7.0));
    }

    #[test]
    fn test_boolean_variants() {
        let ep = endpoint(vec![param("b", ColumnType::Boolean)]);
        for (input, expected) in [
            (json!({"b": true}), true),
            (json!({"b": 1}), true),
            (json!({"b": 0}), false),
            (json!({"b": "TRUE"}), true),
            (json!({"b": "false"}), false),
        ] {
            let coerced = coerce_params(&ep, &raw(input)).unwrap();
            assert_eq!(coerced["b"], ParamValue::Bool(expected));
        }
        assert!(coerce_params(&ep, &raw(json!({"b": "yes"}))).is_err());
    }

    #[test]
    fn test_datetime_requires_rfc3339() {
        let ep = endpoint(vec![param("ts", ColumnType::Datetime)]);
        let coerced = coerce_params(&ep, &raw(json!({"ts": "2024-05-01T12:30:00Z"}))).unwrap();
        assert!(matches!(coerced["ts"], ParamValue::Timestamp(_)));

        assert!(coerce_params(&ep, &raw(json!({"ts": "01/05/2024"}))).is_err());
    }

    #[test]
    fn test_string_stringifies_scalars_rejects_composites() {
        let ep = endpoint(vec![param("s", ColumnType::String)]);
        let coerced = coerce_params(&ep, &raw(json!({"s": 12}))).unwrap();
        assert_eq!(coerced["s"], ParamValue::Text("12".into()));

        assert!(coerce_params(&ep, &raw(json!({"s": {"k": 1}}))).is_err());
    }

    #[test]
    fn test_composites_accept_structured_or_json_text() {
        let ep = endpoint(vec![
            param("tags", ColumnType::Array),
            param("meta", ColumnType::Object),
        ]);
        let coerced = coerce_params(
            &ep,
            &raw(json!({"tags": "[1, 2]", "meta": {"k": "v"}})),
        )
        .unwrap();
        assert_eq!(coerced["tags"], ParamValue::Json(json!([1, 2])));
        assert_eq!(coerced["meta"], ParamValue::Json(json!({"k": "v"})));

        assert!(coerce_params(&ep, &raw(json!({"tags": "{}", "meta": "{}"}))).is_err());
    }

    #[test]
    fn test_missing_required_fails() {
        let mut p = param("id", ColumnType::Integer);
        p.required = true;
        let ep = endpoint(vec![p]);
        let err = coerce_params(&ep, &raw(json!({}))).unwrap_err();
        assert!(matches!(err, GatewayError::MissingParam { name } if name == "id"));
    }

    #[test]
    fn test_default_is_materialized() {
        let mut p = param("limit", ColumnType::Integer);
        p.default = Some(json!(10));
        let ep = endpoint(vec![p]);
        let coerced = coerce_params(&ep, &raw(json!({}))).unwrap();
        assert_eq!(coerced["limit"], ParamValue::Int(10));
    }

    #[test]
    fn test_output_keys_match_declared_params() {
        let ep = endpoint(vec![
            param("a", ColumnType::String),
            param("b", ColumnType::Integer),
        ]);
        let coerced = coerce_params(&ep, &raw(json!({"a": "x", "junk": 1}))).unwrap();
        let keys: Vec<_> = coerced.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        // optional, absent, no default: bound as NULL
        assert_eq!(coerced["b"], ParamValue::Null);
    }
}
