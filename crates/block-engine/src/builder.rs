//! Fluent builder for scenes
//!
//! Provides a fluent API for constructing in-memory scenes programmatically.

use crate::registry::BlockRegistry;
use crate::scene::{InMemoryScene, SceneSnapshot};
use crate::types::{BlockInstance, Connector};

/// Fluent builder for constructing scenes
///
/// # Example
///
/// ```ignore
/// let scene = SceneBuilder::new()
///     .add_block("trigger", "manual-trigger")
///     .with_config(serde_json::json!({"payload": 5}))
///     .add_block("out", "display")
///     .connect("trigger", "payload", "out", "value")
///     .build();
/// ```
#[derive(Default)]
pub struct SceneBuilder {
    instances: Vec<BlockInstance>,
    connectors: Vec<Connector>,
    connector_counter: usize,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block instance with an empty configuration
    pub fn add_block(mut self, id: impl Into<String>, block_type: impl Into<String>) -> Self {
        self.instances.push(BlockInstance::new(id, block_type));
        self
    }

    /// Add a block instance configured with its definition's default config
    ///
    /// Falls back to an empty configuration when the type is not registered.
    pub fn add_block_from(mut self, id: impl Into<String>, block_type: &str, registry: &BlockRegistry) -> Self {
        let instance = match registry.get(block_type) {
            Ok(definition) => BlockInstance::from_definition(id, definition),
            Err(_) => BlockInstance::new(id, block_type),
        };
        self.instances.push(instance);
        self
    }

    /// Set the configuration of the most recently added block
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let Some(instance) = self.instances.last_mut() {
            instance.config = config;
        }
        self
    }

    /// Set a static input on the most recently added block
    pub fn with_static_input(mut self, port: impl Into<String>, value: serde_json::Value) -> Self {
        if let Some(instance) = self.instances.last_mut() {
            instance.static_inputs.insert(port.into(), value);
        }
        self
    }

    /// Connect two ports (auto-generates the connector id)
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.connector_counter += 1;
        let id = format!("connector-{}", self.connector_counter);
        self.connectors
            .push(Connector::new(id, source, source_port, target, target_port));
        self
    }

    /// Add a connector as-is, including dangling ones
    pub fn add_connector(mut self, connector: Connector) -> Self {
        self.connectors.push(connector);
        self
    }

    pub fn snapshot(self) -> SceneSnapshot {
        SceneSnapshot {
            instances: self.instances,
            connectors: self.connectors,
        }
    }

    pub fn build(self) -> InMemoryScene {
        InMemoryScene::from_snapshot(self.snapshot())
    }
}
