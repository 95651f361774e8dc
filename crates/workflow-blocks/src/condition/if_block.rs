//! If Block
//!
//! Routes a value to one of two outputs based on a condition.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::ports::{outputs, require, truthy};
use crate::BlockDescriptor;

/// If Block
///
/// When the condition is truthy the value flows to `true` and `false` is
/// null; otherwise the reverse. `result` always carries the condition.
///
/// # Inputs
/// - `condition` (required) - Condition, coerced by truthiness
/// - `value` - Value to route (default: the condition itself)
pub struct IfBlock;

impl IfBlock {
    pub const PORT_CONDITION: &'static str = "condition";
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_TRUE: &'static str = "true";
    pub const PORT_FALSE: &'static str = "false";
    pub const PORT_RESULT: &'static str = "result";
}

impl BlockDescriptor for IfBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("if", BlockCategory::Condition, "If")
            .with_description("Routes a value based on a boolean condition")
            .input(InputPort::required(Self::PORT_CONDITION, "Condition", PortDataType::Boolean))
            .input(InputPort::optional(Self::PORT_VALUE, "Value", PortDataType::Any).accepting([PortDataType::Any]))
            .output(OutputPort::new(Self::PORT_TRUE, "True", PortDataType::Any))
            .output(OutputPort::new(Self::PORT_FALSE, "False", PortDataType::Any))
            .output(OutputPort::new(Self::PORT_RESULT, "Result", PortDataType::Boolean))
    }
}

#[async_trait]
impl BlockExecutor for IfBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        _config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let condition = truthy(require(&inputs, Self::PORT_CONDITION)?);
        let value = inputs
            .get(Self::PORT_VALUE)
            .cloned()
            .unwrap_or_else(|| json!(condition));

        log::debug!("IfBlock {}: condition={}", ctx.instance_id, condition);

        let (on_true, on_false) = if condition {
            (value, Value::Null)
        } else {
            (Value::Null, value)
        };
        Ok(outputs([
            (Self::PORT_TRUE, on_true),
            (Self::PORT_FALSE, on_false),
            (Self::PORT_RESULT, json!(condition)),
        ]))
    }
}
