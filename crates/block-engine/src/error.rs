//! Error types for the block engine

use thiserror::Error;

/// Result type alias using BlockEngineError
pub type Result<T> = std::result::Result<T, BlockEngineError>;

/// Errors that can occur while resolving or executing blocks
///
/// Structural problems found before a run (type mismatches, cycles, ...)
/// are not errors; they are reported as [`crate::validation::ValidationIssue`]s.
#[derive(Debug, Error)]
pub enum BlockEngineError {
    /// No definition is registered under this block type
    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    /// A definition exists but no executor function was registered for it
    #[error("No executor registered for block type '{0}'")]
    NoExecutorRegistered(String),

    /// The scene has no instance with this id
    #[error("Block instance not found: {0}")]
    InstanceNotFound(String),

    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Invalid input type
    #[error("Invalid input type for '{port}': expected {expected}")]
    InvalidInputType { port: String, expected: String },

    /// Block execution failed
    #[error("Block execution failed: {0}")]
    ExecutionFailed(String),

    /// Execution was cancelled through the abort signal
    #[error("Execution cancelled")]
    Cancelled,

    /// The external scene rejected a mutation
    #[error("Scene error: {0}")]
    Scene(String),

    /// Configuration could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlockEngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create an invalid input type error
    pub fn invalid_input(port: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidInputType {
            port: port.into(),
            expected: expected.into(),
        }
    }
}
