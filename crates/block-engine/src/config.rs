//! Engine configuration
//!
//! Loaded from and saved to JSON. Every section has defaults, so a missing
//! file or a partial one is fine.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::BlockEngineError;

/// Execution behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    /// Send workflow events to the configured sink
    pub emit_events: bool,
    /// Reset every instance before a whole-graph run
    pub reset_before_run: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            emit_events: true,
            reset_before_run: false,
        }
    }
}

/// Pre-flight validation behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Refuse runs that only have warnings
    pub warnings_as_errors: bool,
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub execution: ExecutionConfig,
    pub validation: ValidationConfig,
}

impl EngineConfig {
    /// Load configuration from a JSON file, using defaults if it does not exist
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path).await
    }

    /// Save configuration to a JSON file
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save_json(self, path).await
    }
}

/// Read a JSON configuration file, falling back to defaults when it is absent
pub async fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    if !fs::try_exists(path).await.map_err(ConfigError::Io)? {
        log::debug!("No config at {:?}, using defaults", path);
        return Ok(T::default());
    }

    let contents = fs::read_to_string(path).await.map_err(ConfigError::Io)?;
    serde_json::from_str(&contents).map_err(ConfigError::Parse)
}

/// Write a value as pretty JSON, creating parent directories
pub async fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(ConfigError::Io)?;
        }
    }

    let contents = serde_json::to_string_pretty(value).map_err(ConfigError::Serialize)?;
    fs::write(path, contents).await.map_err(ConfigError::Io)?;

    log::info!("Configuration saved to {:?}", path);
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

impl From<ConfigError> for BlockEngineError {
    fn from(err: ConfigError) -> Self {
        BlockEngineError::Config(err.to_string())
    }
}
