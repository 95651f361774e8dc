//! LLM Prompt Block
//!
//! Sends a prompt to the configured AI provider and outputs the reply.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::json;

use super::provider::{provider_from, CompletionRequest};
use crate::ports::{as_text, config_f64, config_str, config_u64, optional, outputs, require_text};
use crate::BlockDescriptor;

/// LLM Prompt Block
///
/// # Inputs
/// - `prompt` (required) - User prompt
/// - `system` - System prompt, overriding the `systemPrompt` config
///
/// # Configuration
/// - `model`, `temperature`, `maxTokens`, `systemPrompt`
///
/// # Outputs
/// - `response` - Completion text
/// - `model` - Model that answered
pub struct LlmPromptBlock;

impl LlmPromptBlock {
    pub const PORT_PROMPT: &'static str = "prompt";
    pub const PORT_SYSTEM: &'static str = "system";
    pub const PORT_RESPONSE: &'static str = "response";
    pub const PORT_MODEL: &'static str = "model";
}

impl BlockDescriptor for LlmPromptBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("llm-prompt", BlockCategory::Ai, "LLM Prompt")
            .with_description("Generates text with a language model")
            .input(InputPort::required(Self::PORT_PROMPT, "Prompt", PortDataType::Text))
            .input(InputPort::optional(Self::PORT_SYSTEM, "System Prompt", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_RESPONSE, "Response", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_MODEL, "Model", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string" },
                    "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
                    "maxTokens": { "type": "integer", "minimum": 1 },
                    "systemPrompt": { "type": "string" }
                }
            }))
            .with_default_config(json!({ "temperature": 0.7 }))
    }
}

#[async_trait]
impl BlockExecutor for LlmPromptBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let provider = provider_from(ctx)?;
        let prompt = require_text(&inputs, Self::PORT_PROMPT)?;
        let system = optional(&inputs, Self::PORT_SYSTEM)
            .map(as_text)
            .or_else(|| config_str(config, "systemPrompt").map(str::to_string));

        let request = CompletionRequest {
            prompt,
            system,
            model: config_str(config, "model").map(str::to_string),
            temperature: config_f64(config, "temperature"),
            max_tokens: config_u64(config, "maxTokens"),
        };

        log::debug!(
            "LlmPromptBlock {}: sending {} chars to {}",
            ctx.instance_id,
            request.prompt.len(),
            provider.name()
        );
        let response = provider.complete(request).await?;
        log::debug!(
            "LlmPromptBlock {}: {} chars from '{}'",
            ctx.instance_id,
            response.text.len(),
            response.model
        );

        Ok(outputs([
            (Self::PORT_RESPONSE, json!(response.text)),
            (Self::PORT_MODEL, json!(response.model)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ai::provider::testing::MockProvider;
    use crate::ai::AiProvider;
    use block_engine::{extension_keys, BlockEngineError, ExecutorExtensions};

    fn inputs(prompt: &str) -> BlockInputs {
        let mut inputs = BlockInputs::new();
        inputs.insert("prompt".into(), json!(prompt));
        inputs
    }

    #[tokio::test]
    async fn test_completes_with_provider() {
        let mock = Arc::new(MockProvider::default());
        let provider: Arc<dyn AiProvider> = mock.clone();
        let mut ext = ExecutorExtensions::new();
        ext.set(extension_keys::AI_PROVIDER, provider);
        let ctx = ExecutionContext::new("llm", &ext);

        let config = json!({"model": "small", "systemPrompt": "terse", "maxTokens": 10});
        let out = LlmPromptBlock.execute(&ctx, inputs("hello"), &config).await.unwrap();
        assert_eq!(out["response"], "echo: hello");
        assert_eq!(out["model"], "small");

        let seen = mock.completions.lock();
        assert_eq!(seen[0].system.as_deref(), Some("terse"));
        assert_eq!(seen[0].max_tokens, Some(10));
    }

    #[tokio::test]
    async fn test_missing_provider_is_an_error() {
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("llm", &ext);
        let err = LlmPromptBlock.execute(&ctx, inputs("x"), &json!({})).await.unwrap_err();
        assert!(matches!(err, BlockEngineError::ExecutionFailed(m) if m.contains("No AI provider")));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider: Arc<dyn AiProvider> = Arc::new(MockProvider {
            fail: true,
            ..Default::default()
        });
        let mut ext = ExecutorExtensions::new();
        ext.set(extension_keys::AI_PROVIDER, provider);
        let ctx = ExecutionContext::new("llm", &ext);

        let err = LlmPromptBlock.execute(&ctx, inputs("x"), &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
