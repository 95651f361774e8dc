//! JSON Parse Block

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde_json::Value;

use crate::ports::{outputs, require};
use crate::BlockDescriptor;

/// JSON Parse Block
///
/// Parses text into a JSON value. Non-string inputs pass through unchanged.
pub struct JsonParseBlock;

impl JsonParseBlock {
    pub const PORT_TEXT: &'static str = "text";
    pub const PORT_VALUE: &'static str = "value";
}

impl BlockDescriptor for JsonParseBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("json-parse", BlockCategory::Transformer, "JSON Parse")
            .with_description("Parses JSON text into a value")
            .input(InputPort::required(Self::PORT_TEXT, "Text", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_VALUE, "Value", PortDataType::Any))
    }
}

#[async_trait]
impl BlockExecutor for JsonParseBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        _config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let value = match require(&inputs, Self::PORT_TEXT)? {
            Value::String(text) => serde_json::from_str(text).map_err(|e| {
                BlockEngineError::failed(format!("Invalid JSON in block {}: {}", ctx.instance_id, e))
            })?,
            other => other.clone(),
        };
        Ok(outputs([(Self::PORT_VALUE, value)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_engine::ExecutorExtensions;
    use serde_json::json;

    #[tokio::test]
    async fn test_parse() {
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("p", &ext);

        let mut inputs = BlockInputs::new();
        inputs.insert("text".into(), json!(r#"{"a": [1, 2]}"#));
        let out = JsonParseBlock.execute(&ctx, inputs, &json!({})).await.unwrap();
        assert_eq!(out["value"], json!({"a": [1, 2]}));

        let mut inputs = BlockInputs::new();
        inputs.insert("text".into(), json!("{not json"));
        assert!(JsonParseBlock.execute(&ctx, inputs, &json!({})).await.is_err());
    }
}
