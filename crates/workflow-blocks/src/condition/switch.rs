//! Switch Block
//!
//! Matches a value against a list of configured cases.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use super::compare::CompareOperator;
use crate::ports::{as_text, outputs, require};
use crate::BlockDescriptor;

/// Label reported when no case matches
pub const DEFAULT_CASE: &str = "default";

/// Switch Block
///
/// Cases are either plain values or `{ "value": ..., "label": ... }`
/// objects. The first case equal to the input wins; numbers compare
/// numerically.
///
/// # Outputs
/// - `matched` - Label of the matching case, or `"default"`
/// - `index` - Position of the matching case, or -1
/// - `output` - The input value
pub struct SwitchBlock;

impl SwitchBlock {
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_MATCHED: &'static str = "matched";
    pub const PORT_INDEX: &'static str = "index";
    pub const PORT_OUTPUT: &'static str = "output";

    /// Find the first matching case as `(index, label)`
    fn find_case(value: &Value, cases: &[Value]) -> Option<(usize, String)> {
        cases.iter().enumerate().find_map(|(index, case)| {
            let (case_value, label) = match case {
                Value::Object(map) if map.contains_key("value") => {
                    let case_value = &map["value"];
                    let label = map.get("label").map(as_text).unwrap_or_else(|| as_text(case_value));
                    (case_value, label)
                }
                other => (other, as_text(other)),
            };
            CompareOperator::Eq
                .apply(value, case_value)
                .unwrap_or(false)
                .then_some((index, label))
        })
    }
}

impl BlockDescriptor for SwitchBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("switch", BlockCategory::Condition, "Switch")
            .with_description("Selects a case matching the input value")
            .input(InputPort::required(Self::PORT_VALUE, "Value", PortDataType::Any).accepting([PortDataType::Any]))
            .output(OutputPort::new(Self::PORT_MATCHED, "Matched", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_INDEX, "Index", PortDataType::Number))
            .output(OutputPort::new(Self::PORT_OUTPUT, "Output", PortDataType::Any))
            .with_config_schema(json!({
                "type": "object",
                "properties": { "cases": { "type": "array" } }
            }))
            .with_default_config(json!({ "cases": [] }))
    }
}

#[async_trait]
impl BlockExecutor for SwitchBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let value = require(&inputs, Self::PORT_VALUE)?.clone();
        let cases = config.get("cases").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);

        let (index, matched) = match Self::find_case(&value, cases) {
            Some((index, label)) => (json!(index), label),
            None => (json!(-1), DEFAULT_CASE.to_string()),
        };
        log::debug!("SwitchBlock {}: matched '{}'", ctx.instance_id, matched);

        Ok(outputs([
            (Self::PORT_MATCHED, json!(matched)),
            (Self::PORT_INDEX, index),
            (Self::PORT_OUTPUT, value),
        ]))
    }
}
