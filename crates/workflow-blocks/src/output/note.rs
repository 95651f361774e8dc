//! Note Block
//!
//! A text artifact on the canvas. Created by hand or materialised by the
//! markdown block.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::json;

use crate::ports::{as_text, config_str, optional, outputs};
use crate::BlockDescriptor;

/// Note Block
///
/// Outputs the `text` input when connected, otherwise the configured `content`.
pub struct NoteBlock;

impl NoteBlock {
    pub const BLOCK_TYPE: &'static str = "note";
    pub const PORT_TEXT: &'static str = "text";
    pub const PORT_CONTENT: &'static str = "content";
}

impl BlockDescriptor for NoteBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new(Self::BLOCK_TYPE, BlockCategory::Output, "Note")
            .with_description("Holds a piece of text")
            .input(InputPort::optional(Self::PORT_TEXT, "Text", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_CONTENT, "Content", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": { "content": { "type": "string" } }
            }))
            .with_default_config(json!({ "content": "" }))
    }
}

#[async_trait]
impl BlockExecutor for NoteBlock {
    async fn execute(
        &self,
        _ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let content = optional(&inputs, Self::PORT_TEXT)
            .map(as_text)
            .unwrap_or_else(|| config_str(config, "content").unwrap_or_default().to_string());
        Ok(outputs([(Self::PORT_CONTENT, json!(content))]))
    }
}
