//! Configuration for the built-in blocks

use std::path::Path;

use block_engine::config::{load_json, save_json, ConfigError};
use serde::{Deserialize, Serialize};

/// Settings for the HTTP action block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: format!("blockflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Settings for the delay block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelayConfig {
    /// Upper bound applied to every configured delay
    pub max_delay_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self { max_delay_ms: 60_000 }
    }
}

/// Settings for the OpenAI-compatible AI provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub base_url: String,
    /// API key; `OPENAI_API_KEY` is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub voice: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

impl AiConfig {
    /// The configured key, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Configuration for every built-in block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlocksConfig {
    pub http: HttpConfig,
    pub delay: DelayConfig,
    pub ai: AiConfig,
}

impl BlocksConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path).await
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save_json(self, path).await
    }
}
