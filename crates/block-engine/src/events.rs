//! Event types for streaming workflow progress
//!
//! Events are sent from the executor to any consumer (a canvas, a log, a
//! test) to report run and block state changes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Trait for sending workflow events
///
/// Abstracts over the transport so the executor can report to a UI
/// channel, a log, or a test collector.
pub trait EventSink: Send + Sync {
    /// Returns an error if the event could not be delivered
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

/// Events emitted during workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    #[serde(rename_all = "camelCase")]
    WorkflowStarted { run_id: String, total: usize },

    #[serde(rename_all = "camelCase")]
    BlockStarted { run_id: String, instance_id: String },

    #[serde(rename_all = "camelCase")]
    BlockCompleted {
        run_id: String,
        instance_id: String,
        outputs: serde_json::Value,
    },

    #[serde(rename_all = "camelCase")]
    BlockFailed {
        run_id: String,
        instance_id: String,
        error: String,
    },

    #[serde(rename_all = "camelCase")]
    WorkflowProgress {
        run_id: String,
        completed: usize,
        total: usize,
    },

    #[serde(rename_all = "camelCase")]
    WorkflowCompleted { run_id: String, completed: usize },

    #[serde(rename_all = "camelCase")]
    WorkflowFailed { run_id: String, error: String },

    #[serde(rename_all = "camelCase")]
    WorkflowCancelled { run_id: String, completed: usize },

    /// Every instance was returned to idle
    #[serde(rename_all = "camelCase")]
    WorkflowReset { instances: usize },
}

impl WorkflowEvent {
    /// Instance id for block-level events
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            Self::BlockStarted { instance_id, .. }
            | Self::BlockCompleted { instance_id, .. }
            | Self::BlockFailed { instance_id, .. } => Some(instance_id),
            _ => None,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Sink that writes every event to the log
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        match &event {
            WorkflowEvent::BlockFailed { instance_id, error, .. } => {
                log::error!("Block '{}' failed: {}", instance_id, error)
            }
            WorkflowEvent::WorkflowFailed { error, .. } => log::error!("Workflow failed: {}", error),
            other => log::debug!("{:?}", other),
        }
        Ok(())
    }
}
