//! AI blocks
//!
//! Language-model, image and speech generation through an [`AiProvider`].

mod image_generate;
mod llm_prompt;
pub mod provider;
mod text_to_speech;

pub use image_generate::ImageGenerateBlock;
pub use llm_prompt::LlmPromptBlock;
pub use provider::{AiError, AiProvider, OpenAiProvider};
pub use text_to_speech::TextToSpeechBlock;
