//! Image Generate Block

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use super::provider::{provider_from, ImageRequest};
use crate::ports::{config_str, outputs, require_text};
use crate::BlockDescriptor;

/// Image Generate Block
///
/// # Configuration
/// - `model` - Image model (provider default when unset)
/// - `size` - e.g. `1024x1024`
///
/// # Outputs
/// - `image` - Image URL or data URI
/// - `revisedPrompt` - Prompt as rewritten by the provider, if any
pub struct ImageGenerateBlock;

impl ImageGenerateBlock {
    pub const PORT_PROMPT: &'static str = "prompt";
    pub const PORT_IMAGE: &'static str = "image";
    pub const PORT_REVISED_PROMPT: &'static str = "revisedPrompt";
}

impl BlockDescriptor for ImageGenerateBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("image-generate", BlockCategory::Ai, "Generate Image")
            .with_description("Generates an image from a prompt")
            .input(InputPort::required(Self::PORT_PROMPT, "Prompt", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_IMAGE, "Image", PortDataType::Image))
            .output(OutputPort::new(Self::PORT_REVISED_PROMPT, "Revised Prompt", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string" },
                    "size": { "type": "string", "enum": ["256x256", "512x512", "1024x1024", "1792x1024", "1024x1792"] }
                }
            }))
            .with_default_config(json!({ "size": "1024x1024" }))
    }
}

#[async_trait]
impl BlockExecutor for ImageGenerateBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let provider = provider_from(ctx)?;
        let request = ImageRequest {
            prompt: require_text(&inputs, Self::PORT_PROMPT)?,
            model: config_str(config, "model").map(str::to_string),
            size: config_str(config, "size").map(str::to_string),
        };

        log::debug!("ImageGenerateBlock {}: generating with {}", ctx.instance_id, provider.name());
        let response = provider.generate_image(request).await?;
        let image = response
            .src()
            .ok_or_else(|| BlockEngineError::failed("Provider returned no image"))?;

        Ok(outputs([
            (Self::PORT_IMAGE, json!(image)),
            (
                Self::PORT_REVISED_PROMPT,
                response.revised_prompt.map(Value::String).unwrap_or(Value::Null),
            ),
        ]))
    }
}
