//! AI provider collaborator
//!
//! The language-model, image and speech blocks talk to an [`AiProvider`]
//! found in the execution extensions under `extension_keys::AI_PROVIDER`.
//! [`OpenAiProvider`] implements it against any OpenAI-compatible HTTP API.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use block_engine::{extension_keys, BlockEngineError, ExecutionContext};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::AiConfig;

/// Errors returned by AI providers
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("AI authentication failed: {0}")]
    Authentication(String),

    #[error("Unexpected AI response: {0}")]
    InvalidResponse(String),

    #[error("Invalid AI request: {0}")]
    InvalidRequest(String),
}

impl From<AiError> for BlockEngineError {
    fn from(err: AiError) -> Self {
        BlockEngineError::ExecutionFailed(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// Provider default when `None`
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: Option<String>,
    /// e.g. `1024x1024`
    pub size: Option<String>,
}

/// A generated image, either hosted or inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub url: Option<String>,
    pub b64_json: Option<String>,
    pub revised_prompt: Option<String>,
}

impl ImageResponse {
    /// A URL usable by a client: the hosted URL or a PNG data URI
    pub fn src(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| self.b64_json.as_ref().map(|b64| format!("data:image/png;base64,{}", b64)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResponse {
    pub audio: Vec<u8>,
    pub mime_type: String,
}

impl SpeechResponse {
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.audio)
        )
    }
}

/// Text, image and speech generation backend
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AiError>;

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, AiError>;

    async fn synthesize_speech(&self, request: SpeechRequest) -> Result<SpeechResponse, AiError>;
}

/// Look up the provider from the execution extensions
pub fn provider_from(ctx: &ExecutionContext<'_>) -> Result<Arc<dyn AiProvider>, BlockEngineError> {
    ctx.extensions
        .get::<Arc<dyn AiProvider>>(extension_keys::AI_PROVIDER)
        .cloned()
        .ok_or_else(|| BlockEngineError::failed("No AI provider configured"))
}

/// Provider for OpenAI-compatible APIs
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: AiConfig,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(config: AiConfig, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), config, api_key)
    }

    pub fn with_client(client: reqwest::Client, config: AiConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            config,
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| AiError::InvalidRequest(e.to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    fn completion_payload(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut payload = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.chat_model),
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        payload
    }

    fn parse_completion(body: &Value) -> Result<CompletionResponse, AiError> {
        let choice = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| AiError::InvalidResponse("response has no choices".to_string()))?;
        let text = choice
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(CompletionResponse {
            text,
            model: body.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string(),
            finish_reason: choice.get("finish_reason").and_then(Value::as_str).map(str::to_string),
        })
    }

    fn parse_image(body: &Value) -> Result<ImageResponse, AiError> {
        let image = body
            .get("data")
            .and_then(Value::as_array)
            .and_then(|data| data.first())
            .ok_or_else(|| AiError::InvalidResponse("response has no image data".to_string()))?;
        let field = |name: &str| image.get(name).and_then(Value::as_str).map(str::to_string);

        let response = ImageResponse {
            url: field("url"),
            b64_json: field("b64_json"),
            revised_prompt: field("revised_prompt"),
        };
        if response.src().is_none() {
            return Err(AiError::InvalidResponse("image has neither url nor b64_json".to_string()));
        }
        Ok(response)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => AiError::Authentication(body),
            code => AiError::Api { status: code, body },
        })
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, AiError> {
        let url = self.url(path);
        log::debug!("OpenAiProvider: POST {}", url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AiError> {
        let body = self
            .post_json("chat/completions", &self.completion_payload(&request))
            .await?;
        Self::parse_completion(&body)
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, AiError> {
        let mut payload = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.image_model),
            "prompt": request.prompt,
            "n": 1,
        });
        if let Some(size) = &request.size {
            payload["size"] = json!(size);
        }
        let body = self.post_json("images/generations", &payload).await?;
        Self::parse_image(&body)
    }

    async fn synthesize_speech(&self, request: SpeechRequest) -> Result<SpeechResponse, AiError> {
        let payload = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.speech_model),
            "voice": request.voice.as_deref().unwrap_or(&self.config.voice),
            "input": request.text,
            "response_format": "mp3",
        });
        let url = self.url("audio/speech");
        log::debug!("OpenAiProvider: POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let audio = response.bytes().await?.to_vec();

        Ok(SpeechResponse { audio, mime_type })
    }
}
