//! Extensions setup for host applications.
//!
//! Hosts call [`setup_extensions`] at startup to place the collaborators the
//! built-in blocks reach for in the shared `ExecutorExtensions`. The scene
//! handle is host-specific and is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use block_engine::{extension_keys, BlockEngineError, ExecutorExtensions, Result};

use crate::ai::{AiProvider, OpenAiProvider};
use crate::config::BlocksConfig;
use crate::output::{LogNotifier, Notifier};

/// Build the HTTP client shared by the HTTP block and the AI provider
pub fn http_client(config: &BlocksConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http.timeout_ms))
        .user_agent(config.http.user_agent.clone())
        .build()
        .map_err(|e| BlockEngineError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Initialize the standard collaborators in `ExecutorExtensions`.
///
/// Sets:
/// - **HTTP client** under `extension_keys::HTTP_CLIENT`
/// - **AI provider** under `extension_keys::AI_PROVIDER`, only when an API
///   key is configured or found in `OPENAI_API_KEY`
/// - **Notifier** under `extension_keys::NOTIFIER` (a [`LogNotifier`]) unless
///   the host already registered one
///
/// # Example
///
/// ```ignore
/// let mut extensions = block_engine::ExecutorExtensions::new();
/// workflow_blocks::setup_extensions(&mut extensions, &BlocksConfig::default())?;
/// ```
pub fn setup_extensions(extensions: &mut ExecutorExtensions, config: &BlocksConfig) -> Result<()> {
    let client = http_client(config)?;
    extensions.set(extension_keys::HTTP_CLIENT, client.clone());

    match config.ai.resolved_api_key() {
        Some(key) => {
            let provider: Arc<dyn AiProvider> = Arc::new(OpenAiProvider::with_client(client, config.ai.clone(), key));
            extensions.set(extension_keys::AI_PROVIDER, provider);
            log::info!("AI provider configured for {}", config.ai.base_url);
        }
        None => log::info!("No AI API key configured; AI blocks will fail until one is set"),
    }

    if !extensions.has(extension_keys::NOTIFIER) {
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        extensions.set(extension_keys::NOTIFIER, notifier);
    }
    Ok(())
}
