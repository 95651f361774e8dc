//! JSON Stringify Block

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::ports::{config_bool, outputs};
use crate::BlockDescriptor;

/// JSON Stringify Block
///
/// # Configuration
/// - `pretty` - Indent the output (default: false)
pub struct JsonStringifyBlock;

impl JsonStringifyBlock {
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_TEXT: &'static str = "text";
}

impl BlockDescriptor for JsonStringifyBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("json-stringify", BlockCategory::Transformer, "JSON Stringify")
            .with_description("Serializes a value to JSON text")
            .input(
                InputPort::optional(Self::PORT_VALUE, "Value", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_TEXT, "Text", PortDataType::Text))
            .with_default_config(json!({ "pretty": false }))
    }
}

#[async_trait]
impl BlockExecutor for JsonStringifyBlock {
    async fn execute(
        &self,
        _ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let value = inputs.get(Self::PORT_VALUE).cloned().unwrap_or(Value::Null);
        let text = if config_bool(config, "pretty").unwrap_or(false) {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(outputs([(Self::PORT_TEXT, json!(text))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_engine::ExecutorExtensions;

    #[tokio::test]
    async fn test_stringify_compact_and_pretty() {
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("s", &ext);
        let mut inputs = BlockInputs::new();
        inputs.insert("value".into(), json!({"a": 1}));

        let out = JsonStringifyBlock.execute(&ctx, inputs.clone(), &json!({})).await.unwrap();
        assert_eq!(out["text"], r#"{"a":1}"#);

        let out = JsonStringifyBlock
            .execute(&ctx, inputs, &json!({"pretty": true}))
            .await
            .unwrap();
        assert_eq!(out["text"], "{\n  \"a\": 1\n}");
    }
}
