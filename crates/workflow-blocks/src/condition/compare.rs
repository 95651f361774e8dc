//! Compare Block
//!
//! Compares two values with a configured operator.

use std::cmp::Ordering;

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ports::{as_text, config_str, outputs};
use crate::BlockDescriptor;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOperator {
    pub fn parse(name: &str) -> Result<Self> {
        serde_json::from_value(json!(name))
            .map_err(|_| BlockEngineError::failed(format!("Unknown comparison operator '{}'", name)))
    }

    /// Apply the operator
    ///
    /// Numbers compare numerically, strings lexicographically. Equality
    /// treats numerically equal numbers as equal regardless of
    /// representation.
    pub fn apply(&self, a: &Value, b: &Value) -> Result<bool> {
        match self {
            Self::Eq => Ok(loose_eq(a, b)),
            Self::Ne => Ok(!loose_eq(a, b)),
            Self::Gt => ordering(a, b).map(|o| o == Ordering::Greater),
            Self::Gte => ordering(a, b).map(|o| o != Ordering::Less),
            Self::Lt => ordering(a, b).map(|o| o == Ordering::Less),
            Self::Lte => ordering(a, b).map(|o| o != Ordering::Greater),
            Self::Contains => Ok(match a {
                Value::String(s) => s.contains(&as_text(b)),
                Value::Array(items) => items.iter().any(|item| loose_eq(item, b)),
                Value::Object(map) => map.contains_key(&as_text(b)),
                _ => false,
            }),
            Self::StartsWith => Ok(as_text(a).starts_with(&as_text(b))),
            Self::EndsWith => Ok(as_text(a).ends_with(&as_text(b))),
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn ordering(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y)
                .ok_or_else(|| BlockEngineError::failed("Numbers are not comparable"))
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(BlockEngineError::failed(format!(
            "Cannot order {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compare Block
///
/// # Configuration
/// - `operator` - One of eq, ne, gt, gte, lt, lte, contains, starts_with, ends_with (default: eq)
pub struct CompareBlock;

impl CompareBlock {
    pub const PORT_A: &'static str = "a";
    pub const PORT_B: &'static str = "b";
    pub const PORT_RESULT: &'static str = "result";
}

impl BlockDescriptor for CompareBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("compare", BlockCategory::Condition, "Compare")
            .with_description("Compares two values")
            .input(InputPort::required(Self::PORT_A, "A", PortDataType::Any).accepting([PortDataType::Any]))
            .input(
                InputPort::optional(Self::PORT_B, "B", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_RESULT, "Result", PortDataType::Boolean))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "operator": {
                        "type": "string",
                        "enum": ["eq", "ne", "gt", "gte", "lt", "lte", "contains", "starts_with", "ends_with"]
                    }
                }
            }))
            .with_default_config(json!({ "operator": "eq" }))
    }
}

#[async_trait]
impl BlockExecutor for CompareBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let operator = CompareOperator::parse(config_str(config, "operator").unwrap_or("eq"))?;
        let a = inputs.get(Self::PORT_A).cloned().unwrap_or(Value::Null);
        let b = inputs.get(Self::PORT_B).cloned().unwrap_or(Value::Null);

        let result = operator.apply(&a, &b)?;
        log::debug!("CompareBlock {}: {:?} -> {}", ctx.instance_id, operator, result);

        Ok(outputs([(Self::PORT_RESULT, json!(result))]))
    }
}
