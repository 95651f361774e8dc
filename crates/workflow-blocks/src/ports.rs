//! Helpers for reading block inputs and configuration

use block_engine::{BlockEngineError, BlockInputs, BlockOutputs, Result};
use serde_json::Value;

/// Get a required input, failing with `MissingInput` when absent or null
pub fn require<'a>(inputs: &'a BlockInputs, port: &str) -> Result<&'a Value> {
    match inputs.get(port) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(BlockEngineError::MissingInput(port.to_string())),
    }
}

/// Get a required input and render it as text
pub fn require_text(inputs: &BlockInputs, port: &str) -> Result<String> {
    require(inputs, port).map(as_text)
}

/// Get an optional input, treating null as absent
pub fn optional<'a>(inputs: &'a BlockInputs, port: &str) -> Option<&'a Value> {
    inputs.get(port).filter(|v| !v.is_null())
}

/// Render a value as text: strings as-is, everything else as JSON
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// JavaScript-style truthiness
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

pub fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

pub fn config_bool(config: &Value, key: &str) -> Option<bool> {
    config.get(key).and_then(Value::as_bool)
}

pub fn config_u64(config: &Value, key: &str) -> Option<u64> {
    config.get(key).and_then(Value::as_u64)
}

pub fn config_f64(config: &Value, key: &str) -> Option<f64> {
    config.get(key).and_then(Value::as_f64)
}

/// Build an output map from `(port, value)` pairs
pub fn outputs<const N: usize>(pairs: [(&str, Value); N]) -> BlockOutputs {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
