//! Runner configuration file
//!
//! One JSON document with an `engine` section and a `blocks` section, both
//! optional.

use std::path::Path;

use block_engine::config::{load_json, save_json};
use block_engine::{ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};
use workflow_blocks::BlocksConfig;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "blockflow.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    pub engine: EngineConfig,
    pub blocks: BlocksConfig,
}

impl RunnerConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path).await
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save_json(self, path).await
    }
}
