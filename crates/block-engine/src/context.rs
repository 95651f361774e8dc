//! Execution context handed to block executor functions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::extensions::ExecutorExtensions;

/// Cooperative cancellation flag shared between a host and a run
///
/// The executor checks it before starting each block. Long-running blocks
/// may check it themselves.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation has been requested
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a block executor may see besides its inputs and configuration
pub struct ExecutionContext<'a> {
    /// The instance being executed
    pub instance_id: &'a str,
    /// When this execution attempt started
    pub timestamp: DateTime<Utc>,
    /// Cancellation signal of the surrounding run, if any
    pub abort_signal: Option<&'a AbortSignal>,
    /// Collaborators the host made available
    pub extensions: &'a ExecutorExtensions,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(instance_id: &'a str, extensions: &'a ExecutorExtensions) -> Self {
        Self {
            instance_id,
            timestamp: Utc::now(),
            abort_signal: None,
            extensions,
        }
    }

    pub fn with_abort_signal(mut self, signal: Option<&'a AbortSignal>) -> Self {
        self.abort_signal = signal;
        self
    }

    /// Check if the surrounding run has been cancelled
    pub fn is_aborted(&self) -> bool {
        self.abort_signal.map(AbortSignal::is_aborted).unwrap_or(false)
    }
}
