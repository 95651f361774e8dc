//! Code Block
//!
//! Evaluates a user expression over the block input.

use std::sync::Arc;

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::expression::ExpressionEvaluator;
use crate::ports::{config_str, outputs};
use crate::BlockDescriptor;

/// Code Block
///
/// The expression sees `input` (the input value) and `config` (the block
/// configuration). Evaluation is sandboxed: no I/O, no host access.
///
/// # Configuration
/// - `expression` (required) - e.g. `input.price * input.quantity`
pub struct CodeBlock {
    evaluator: Arc<ExpressionEvaluator>,
}

impl CodeBlock {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_RESULT: &'static str = "result";

    pub fn new(evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl BlockDescriptor for CodeBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("code", BlockCategory::Transformer, "Code")
            .with_description("Evaluates an expression over its input")
            .input(
                InputPort::optional(Self::PORT_INPUT, "Input", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_RESULT, "Result", PortDataType::Any))
            .with_config_schema(json!({
                "type": "object",
                "required": ["expression"],
                "properties": { "expression": { "type": "string" } }
            }))
            .with_default_config(json!({ "expression": "input" }))
    }
}

#[async_trait]
impl BlockExecutor for CodeBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let expression = config_str(config, "expression")
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| BlockEngineError::failed("Code block has no expression configured"))?;
        let input = inputs.get(Self::PORT_INPUT).cloned().unwrap_or(Value::Null);

        log::debug!("CodeBlock {}: evaluating '{}'", ctx.instance_id, expression);
        let result = self
            .evaluator
            .eval(expression, json!({ "input": input, "config": config }))?;

        Ok(outputs([(Self::PORT_RESULT, result)]))
    }
}
