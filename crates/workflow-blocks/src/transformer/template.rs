//! Template Block
//!
//! Renders a text template with data from its input.

use std::sync::Arc;

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Map, Value};

use crate::expression::ExpressionEvaluator;
use crate::ports::{config_str, outputs};
use crate::BlockDescriptor;

/// Template Block
///
/// Fields of an object input are available directly (`{{ name }}`); the
/// whole input is also available as `data`.
///
/// # Configuration
/// - `template` - Template text (default: empty)
pub struct TemplateBlock {
    evaluator: Arc<ExpressionEvaluator>,
}

impl TemplateBlock {
    pub const PORT_DATA: &'static str = "data";
    pub const PORT_TEXT: &'static str = "text";

    pub fn new(evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }

    fn context(data: Value) -> Value {
        let mut vars = match &data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        vars.insert("data".to_string(), data);
        Value::Object(vars)
    }
}

impl BlockDescriptor for TemplateBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("template", BlockCategory::Transformer, "Template")
            .with_description("Renders a text template with input data")
            .input(
                InputPort::optional(Self::PORT_DATA, "Data", PortDataType::Object)
                    .accepting([PortDataType::Any])
                    .with_default(json!({})),
            )
            .output(OutputPort::new(Self::PORT_TEXT, "Text", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": { "template": { "type": "string" } }
            }))
            .with_default_config(json!({ "template": "" }))
    }
}

#[async_trait]
impl BlockExecutor for TemplateBlock {
    async fn execute(
        &self,
        _ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let template = config_str(config, "template").unwrap_or_default();
        let data = inputs.get(Self::PORT_DATA).cloned().unwrap_or(Value::Null);
        let text = self.evaluator.render(template, Self::context(data))?;
        Ok(outputs([(Self::PORT_TEXT, json!(text))]))
    }
}
