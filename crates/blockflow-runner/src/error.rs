use block_engine::{BlockEngineError, ConfigError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Engine(#[from] BlockEngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read scene {path}: {source}")]
    ReadScene {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scene {path}: {source}")]
    ParseScene {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write scene {path}: {source}")]
    WriteScene {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown block category '{0}'")]
    UnknownCategory(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
