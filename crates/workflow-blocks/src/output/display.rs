//! Display Block
//!
//! Terminal block that renders its input as text for the user.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::ports::{as_text, config_str, outputs};
use crate::BlockDescriptor;

/// Display Block
///
/// # Configuration
/// - `format` - `text` (default) or `json` for pretty-printed JSON
pub struct DisplayBlock;

impl DisplayBlock {
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_TEXT: &'static str = "text";
}

impl BlockDescriptor for DisplayBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("display", BlockCategory::Output, "Display")
            .with_description("Displays a value")
            .input(
                InputPort::optional(Self::PORT_VALUE, "Value", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_TEXT, "Text", PortDataType::Text))
            .with_default_config(json!({ "format": "text" }))
    }
}

#[async_trait]
impl BlockExecutor for DisplayBlock {
    async fn execute(
        &self,
        _ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let value = inputs.get(Self::PORT_VALUE).cloned().unwrap_or(Value::Null);
        let text = match config_str(config, "format") {
            Some("json") => serde_json::to_string_pretty(&value)?,
            _ => as_text(&value),
        };
        Ok(outputs([(Self::PORT_TEXT, json!(text))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_engine::ExecutorExtensions;

    #[tokio::test]
    async fn test_formats() {
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("d", &ext);
        let mut inputs = BlockInputs::new();
        inputs.insert("value".into(), json!({"k": [1]}));

        let out = DisplayBlock.execute(&ctx, inputs.clone(), &json!({})).await.unwrap();
        assert_eq!(out["text"], r#"{"k":[1]}"#);

        let out = DisplayBlock
            .execute(&ctx, inputs, &json!({"format": "json"}))
            .await
            .unwrap();
        assert_eq!(out["text"], "{\n  \"k\": [\n    1\n  ]\n}");
    }
}
