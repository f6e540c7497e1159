//! Argument normalization and coercion against an operation's parameters.

use serde_json::{Map, Number, Value};

use super::DispatchError;
use crate::registry::{Operation, ParamKind, ParamLocation, ParamSpec};

/// Unwrap a `{"params": {...}}` argument object into a flat one.
///
/// Operations that declare a parameter literally named `params` are left
/// untouched. Keys inside the wrapper win over keys beside it.
#[must_use]
pub fn flatten_arguments(operation: &Operation, mut arguments: Map<String, Value>) -> Map<String, Value> {
    if operation.find_param("params").is_some() {
        return arguments;
    }
    if let Some(Value::Object(inner)) = arguments.remove("params") {
        arguments.extend(inner);
    }
    arguments
}

/// Coerce `arguments` into the operation's declared parameter types.
///
/// `null` values count as absent. Defaults are applied to absent optional
/// parameters. Required path parameters are not checked here; an absent
/// one surfaces as [`DispatchError::MissingPathParameter`] when the path is
/// built.
///
/// # Errors
///
/// Returns [`DispatchError::ArgumentValidation`] for unknown fields, type
/// mismatches, values outside a declared set, and missing required query
/// parameters.
pub fn coerce_arguments(
    operation: &Operation,
    arguments: Map<String, Value>,
) -> Result<Map<String, Value>, DispatchError> {
    let mut coerced = Map::new();

    for (name, value) in arguments {
        if value.is_null() {
            continue;
        }
        let spec = operation
            .find_param(&name)
            .ok_or_else(|| DispatchError::argument(&name, "unknown parameter"))?;
        let value = coerce_value(spec, value)?;
        check_allowed(spec, &value)?;
        coerced.insert(name, value);
    }

    for spec in &operation.params {
        if coerced.contains_key(spec.name) {
            continue;
        }
        if let Some(default) = &spec.default {
            coerced.insert(spec.name.to_string(), default.clone());
        } else if spec.required && spec.location == ParamLocation::Query {
            return Err(DispatchError::argument(spec.name, "required parameter is missing"));
        }
    }

    Ok(coerced)
}

fn coerce_value(spec: &ParamSpec, value: Value) -> Result<Value, DispatchError> {
    let mismatch = |value: &Value| {
        DispatchError::argument(
            spec.name,
            format!("expected {}, got {value}", spec.kind.json_type()),
        )
    };

    match (spec.kind, value) {
        (ParamKind::String, Value::String(s)) => Ok(Value::String(s)),
        (ParamKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ParamKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        (ParamKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch(&Value::String(s))),

        (ParamKind::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (ParamKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| mismatch(&Value::String(s))),

        (ParamKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ParamKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch(&Value::String(s))),
        },

        (_, other) => Err(mismatch(&other)),
    }
}

fn check_allowed(spec: &ParamSpec, value: &Value) -> Result<(), DispatchError> {
    if spec.allowed.is_empty() {
        return Ok(());
    }
    match value.as_str() {
        Some(s) if spec.allowed.iter().any(|allowed| *allowed == s) => Ok(()),
        _ => Err(DispatchError::argument(
            spec.name,
            format!("must be one of: {}", spec.allowed.join(", ")),
        )),
    }
}

/// Render a coerced value as a query or path string.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn operation() -> Operation {
        Operation::new("GetTimeSeries", "time_series", "Series")
            .param(ParamSpec::query("symbol", ParamKind::String, "Symbol").required())
            .param(ParamSpec::query("outputsize", ParamKind::Integer, "Rows").default_value(json!(30)))
            .param(ParamSpec::query("sd", ParamKind::Number, "Deviations"))
            .param(ParamSpec::query("prepost", ParamKind::Boolean, "Extended hours"))
            .param(ParamSpec::query("order", ParamKind::String, "Order").one_of(&["asc", "desc"]))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_flatten_unwraps_params() {
        let flat = flatten_arguments(&operation(), args(json!({"params": {"symbol": "AAPL"}})));
        assert_eq!(flat, args(json!({"symbol": "AAPL"})));
    }

    #[test]
    fn test_flatten_keeps_flat_arguments() {
        let flat = flatten_arguments(&operation(), args(json!({"symbol": "AAPL"})));
        assert_eq!(flat, args(json!({"symbol": "AAPL"})));
    }

    #[test]
    fn test_flatten_respects_declared_params_parameter() {
        let op = Operation::new("GetOdd", "odd", "Odd")
            .param(ParamSpec::query("params", ParamKind::String, "Literal"));
        let flat = flatten_arguments(&op, args(json!({"params": "x"})));
        assert_eq!(flat, args(json!({"params": "x"})));
    }

    #[test]
    fn test_coerce_applies_types_and_defaults() {
        let coerced = coerce_arguments(
            &operation(),
            args(json!({"symbol": 1234, "sd": "2.5", "prepost": "TRUE", "order": null})),
        )
        .expect("valid");
        assert_eq!(
            coerced,
            args(json!({"symbol": "1234", "outputsize": 30, "sd": 2.5, "prepost": true}))
        );
    }

    #[test]
    fn test_coerce_integral_string() {
        let coerced = coerce_arguments(&operation(), args(json!({"symbol": "AAPL", "outputsize": " 12 "})))
            .expect("valid");
        assert_eq!(coerced["outputsize"], 12);
    }

    #[test]
    fn test_coerce_rejects_fractional_integer() {
        let err = coerce_arguments(&operation(), args(json!({"symbol": "AAPL", "outputsize": "1.5"})))
            .expect_err("invalid");
        assert!(matches!(err, DispatchError::ArgumentValidation { ref field, .. } if field == "outputsize"));

        let err = coerce_arguments(&operation(), args(json!({"symbol": "AAPL", "outputsize": 1.5})))
            .expect_err("invalid");
        assert!(matches!(err, DispatchError::ArgumentValidation { ref field, .. } if field == "outputsize"));
    }

    #[test]
    fn test_coerce_rejects_unknown_field() {
        let err = coerce_arguments(&operation(), args(json!({"symbol": "AAPL", "colour": "red"})))
            .expect_err("invalid");
        assert_eq!(err, DispatchError::argument("colour", "unknown parameter"));
    }

    #[test]
    fn test_coerce_rejects_missing_required() {
        let err = coerce_arguments(&operation(), args(json!({"symbol": null}))).expect_err("invalid");
        assert_eq!(err, DispatchError::argument("symbol", "required parameter is missing"));
    }

    #[test]
    fn test_coerce_rejects_bad_boolean_and_object() {
        assert!(coerce_arguments(&operation(), args(json!({"symbol": "A", "prepost": "yes"}))).is_err());
        assert!(coerce_arguments(&operation(), args(json!({"symbol": {"a": 1}}))).is_err());
    }

    #[test]
    fn test_coerce_enforces_allowed_values() {
        let err = coerce_arguments(&operation(), args(json!({"symbol": "A", "order": "sideways"})))
            .expect_err("invalid");
        assert!(matches!(err, DispatchError::ArgumentValidation { ref reason, .. } if reason.contains("asc, desc")));
    }

    #[test]
    fn test_missing_path_parameter_left_for_substitution() {
        let op = Operation::new("GetMarketMovers", "market_movers/{market}", "Movers")
            .param(ParamSpec::path("market", "Market"));
        let coerced = coerce_arguments(&op, Map::new()).expect("path params not checked here");
        assert!(coerced.is_empty());
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("AAPL")), "AAPL");
        assert_eq!(render_value(&json!(30)), "30");
        assert_eq!(render_value(&json!(true)), "true");
    }
}
