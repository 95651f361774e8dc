//! Typed extension map for the collaborators a block may reach.
//!
//! A block's executor function sees nothing beyond its inputs, its
//! configuration and the [`ExecutionContext`](crate::context::ExecutionContext).
//! Hosts place collaborators (an HTTP client, an AI provider, a handle on
//! the scene for blocks that materialise artifacts) in `ExecutorExtensions`;
//! each block looks up only the keys it declares a use for.
//!
//! # Example
//!
//! ```ignore
//! use block_engine::ExecutorExtensions;
//! use std::sync::Arc;
//!
//! let mut ext = ExecutorExtensions::new();
//! ext.set(extension_keys::HTTP_CLIENT, reqwest::Client::new());
//!
//! // In a BlockExecutor:
//! if let Some(client) = ctx.extensions.get::<reqwest::Client>(extension_keys::HTTP_CLIENT) {
//!     client.get(url).send().await?;
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;

/// Typed extension map holding arbitrary `Send + Sync` collaborators
pub struct ExecutorExtensions {
    inner: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl ExecutorExtensions {
    /// Create an empty extension map.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Insert a typed value under the given key.
    ///
    /// If a value already exists for this key, it is replaced.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.inner.insert(key.to_string(), Box::new(value));
    }

    /// Get a reference to a typed value by key.
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|v| v.downcast_ref())
    }

    /// Check whether a key exists in the map.
    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Remove a value, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.inner.remove(key).is_some()
    }
}

impl Default for ExecutorExtensions {
    fn default() -> Self {
        Self::new()
    }
}

/// Well-known extension keys for standard collaborators.
pub mod extension_keys {
    /// `reqwest::Client` used by HTTP action blocks.
    pub const HTTP_CLIENT: &str = "http_client";
    /// `Arc<dyn AiProvider>` used by language-model, image and speech blocks.
    pub const AI_PROVIDER: &str = "ai_provider";
    /// `Arc<dyn Notifier>` used by the notify output block.
    pub const NOTIFIER: &str = "notifier";
    /// `Arc<dyn Scene>` for blocks that create or delete instances.
    pub const SCENE: &str = "scene";
}
