//! Text To Speech Block

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::json;

use super::provider::{provider_from, SpeechRequest};
use crate::ports::{config_str, outputs, require_text};
use crate::BlockDescriptor;

/// Text To Speech Block
///
/// Outputs the synthesized audio as a base64 data URI.
///
/// # Configuration
/// - `voice`, `model` - Provider defaults when unset
pub struct TextToSpeechBlock;

impl TextToSpeechBlock {
    pub const PORT_TEXT: &'static str = "text";
    pub const PORT_AUDIO: &'static str = "audio";
    pub const PORT_MIME_TYPE: &'static str = "mimeType";
}

impl BlockDescriptor for TextToSpeechBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("text-to-speech", BlockCategory::Ai, "Text to Speech")
            .with_description("Synthesizes speech from text")
            .input(InputPort::required(Self::PORT_TEXT, "Text", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_AUDIO, "Audio", PortDataType::File))
            .output(OutputPort::new(Self::PORT_MIME_TYPE, "MIME Type", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "voice": { "type": "string" },
                    "model": { "type": "string" }
                }
            }))
    }
}

#[async_trait]
impl BlockExecutor for TextToSpeechBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let provider = provider_from(ctx)?;
        let request = SpeechRequest {
            text: require_text(&inputs, Self::PORT_TEXT)?,
            voice: config_str(config, "voice").map(str::to_string),
            model: config_str(config, "model").map(str::to_string),
        };

        let speech = provider.synthesize_speech(request).await?;
        log::debug!("TextToSpeechBlock {}: {} bytes of audio", ctx.instance_id, speech.audio.len());

        Ok(outputs([
            (Self::PORT_AUDIO, json!(speech.data_uri())),
            (Self::PORT_MIME_TYPE, json!(speech.mime_type)),
        ]))
    }
}
