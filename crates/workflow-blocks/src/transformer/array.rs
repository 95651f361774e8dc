//! Array Block
//!
//! List operations over an array input.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::expression::ExpressionEvaluator;
use crate::ports::{as_text, config_str, outputs, require};
use crate::BlockDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayOperation {
    Length,
    First,
    Last,
    Reverse,
    Sort,
    Unique,
    Flatten,
    Join,
    Filter,
    Map,
}

impl ArrayOperation {
    pub fn parse(name: &str) -> Result<Self> {
        serde_json::from_value(json!(name))
            .map_err(|_| BlockEngineError::failed(format!("Unknown array operation '{}'", name)))
    }
}

/// Total order used by `sort`: numbers, then strings, then everything else
/// by its JSON text
fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) => 0,
            Value::String(_) => 1,
            _ => 2,
        }
    }
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

/// Array Block
///
/// # Configuration
/// - `operation` - length, first, last, reverse, sort, unique, flatten,
///   join, filter or map (default: length)
/// - `expression` - For filter/map; sees `item` and `index`
/// - `separator` - For join (default: ",")
///
/// # Outputs
/// - `result` - Operation result
/// - `length` - Length of the result when it is an array, otherwise of the input
pub struct ArrayBlock {
    evaluator: Arc<ExpressionEvaluator>,
}

impl ArrayBlock {
    pub const PORT_ITEMS: &'static str = "items";
    pub const PORT_RESULT: &'static str = "result";
    pub const PORT_LENGTH: &'static str = "length";

    pub fn new(evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }

    fn expression(config: &Value) -> Result<&str> {
        config_str(config, "expression")
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| BlockEngineError::failed("Array filter/map requires an expression"))
    }

    fn apply(&self, operation: ArrayOperation, items: Vec<Value>, config: &Value) -> Result<Value> {
        let result = match operation {
            ArrayOperation::Length => json!(items.len()),
            ArrayOperation::First => items.into_iter().next().unwrap_or(Value::Null),
            ArrayOperation::Last => items.into_iter().next_back().unwrap_or(Value::Null),
            ArrayOperation::Reverse => Value::Array(items.into_iter().rev().collect()),
            ArrayOperation::Sort => {
                let mut items = items;
                items.sort_by(sort_order);
                Value::Array(items)
            }
            ArrayOperation::Unique => {
                let mut seen = HashSet::new();
                Value::Array(items.into_iter().filter(|v| seen.insert(v.to_string())).collect())
            }
            ArrayOperation::Flatten => Value::Array(
                items
                    .into_iter()
                    .flat_map(|v| match v {
                        Value::Array(inner) => inner,
                        other => vec![other],
                    })
                    .collect(),
            ),
            ArrayOperation::Join => {
                let separator = config_str(config, "separator").unwrap_or(",");
                let parts: Vec<String> = items.iter().map(as_text).collect();
                json!(parts.join(separator))
            }
            ArrayOperation::Filter => {
                let expression = Self::expression(config)?;
                let mut kept = Vec::new();
                for (index, item) in items.into_iter().enumerate() {
                    if self
                        .evaluator
                        .eval_bool(expression, json!({ "item": &item, "index": index }))?
                    {
                        kept.push(item);
                    }
                }
                Value::Array(kept)
            }
            ArrayOperation::Map => {
                let expression = Self::expression(config)?;
                let mapped = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.evaluator.eval(expression, json!({ "item": item, "index": index })))
                    .collect::<Result<Vec<_>>>()?;
                Value::Array(mapped)
            }
        };
        Ok(result)
    }
}

impl BlockDescriptor for ArrayBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("array", BlockCategory::Transformer, "Array")
            .with_description("Applies a list operation to an array")
            .input(InputPort::required(Self::PORT_ITEMS, "Items", PortDataType::Array))
            .output(OutputPort::new(Self::PORT_RESULT, "Result", PortDataType::Any))
            .output(OutputPort::new(Self::PORT_LENGTH, "Length", PortDataType::Number))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["length", "first", "last", "reverse", "sort", "unique", "flatten", "join", "filter", "map"]
                    },
                    "expression": { "type": "string" },
                    "separator": { "type": "string" }
                }
            }))
            .with_default_config(json!({ "operation": "length" }))
    }
}

#[async_trait]
impl BlockExecutor for ArrayBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let items = match require(&inputs, Self::PORT_ITEMS)? {
            Value::Array(items) => items.clone(),
            _ => return Err(BlockEngineError::invalid_input(Self::PORT_ITEMS, "array")),
        };
        let operation = ArrayOperation::parse(config_str(config, "operation").unwrap_or("length"))?;
        let input_len = items.len();

        log::debug!("ArrayBlock {}: {:?} over {} items", ctx.instance_id, operation, input_len);
        let result = self.apply(operation, items, config)?;
        let length = result.as_array().map(Vec::len).unwrap_or(input_len);

        Ok(outputs([(Self::PORT_RESULT, result), (Self::PORT_LENGTH, json!(length))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_engine::ExecutorExtensions;

    async fn run(items: Value, config: Value) -> Result<BlockOutputs> {
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("arr", &ext);
        let mut inputs = BlockInputs::new();
        inputs.insert("items".into(), items);
        ArrayBlock::new(Arc::new(ExpressionEvaluator::new()))
            .execute(&ctx, inputs, &config)
            .await
    }

    #[tokio::test]
    async fn test_simple_operations() {
        let items = json!([3, 1, 2, 1]);
        let op = |name: &str| json!({ "operation": name });

        assert_eq!(run(items.clone(), op("length")).await.unwrap()["result"], 4);
        assert_eq!(run(items.clone(), op("first")).await.unwrap()["result"], 3);
        assert_eq!(run(items.clone(), op("last")).await.unwrap()["result"], 1);
        assert_eq!(run(items.clone(), op("reverse")).await.unwrap()["result"], json!([1, 2, 1, 3]));
        assert_eq!(run(items.clone(), op("sort")).await.unwrap()["result"], json!([1, 1, 2, 3]));

        let out = run(items, op("unique")).await.unwrap();
        assert_eq!(out["result"], json!([3, 1, 2]));
        assert_eq!(out["length"], 3);
    }

    #[tokio::test]
    async fn test_first_of_empty_is_null() {
        let out = run(json!([]), json!({"operation": "first"})).await.unwrap();
        assert!(out["result"].is_null());
        assert_eq!(out["length"], 0);
    }

    #[tokio::test]
    async fn test_flatten_and_join() {
        let out = run(json!([[1, 2], 3, [[4]]]), json!({"operation": "flatten"})).await.unwrap();
        assert_eq!(out["result"], json!([1, 2, 3, [4]]));

        let out = run(json!(["a", 1, true]), json!({"operation": "join", "separator": " | "}))
            .await
            .unwrap();
        assert_eq!(out["result"], "a | 1 | true");
        assert_eq!(out["length"], 3);
    }

    #[tokio::test]
    async fn test_filter_and_map() {
        let items = json!([{"n": 1}, {"n": 5}, {"n": 10}]);
        let out = run(items.clone(), json!({"operation": "filter", "expression": "item.n > 2"}))
            .await
            .unwrap();
        assert_eq!(out["result"], json!([{"n": 5}, {"n": 10}]));

        let out = run(items, json!({"operation": "map", "expression": "item.n * 10 + index"}))
            .await
            .unwrap();
        assert_eq!(out["result"], json!([10, 51, 102]));
    }

    #[tokio::test]
    async fn test_errors() {
        assert!(run(json!([1]), json!({"operation": "explode"})).await.is_err());
        assert!(run(json!([1]), json!({"operation": "map"})).await.is_err());
        let err = run(json!({"not": "array"}), json!({})).await.unwrap_err();
        assert!(matches!(err, BlockEngineError::InvalidInputType { .. }));
    }

    #[test]
    fn test_sort_order_groups_types() {
        let mut items = vec![json!("b"), json!(2), json!(null), json!("a"), json!(1.5)];
        items.sort_by(sort_order);
        assert_eq!(items, vec![json!(1.5), json!(2), json!("a"), json!("b"), json!(null)]);
    }
}
