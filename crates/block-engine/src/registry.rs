//! Block type registry
//!
//! Maps block type identifiers to their catalog metadata
//! ([`BlockDefinition`]) and, separately, to the executor function that
//! implements their runtime behaviour. New block kinds are added by
//! registering new entries; there is no block base class to extend.
//!
//! The registry is an ordinary value. Hosts construct one at startup,
//! populate it with the built-in catalog plus any custom kinds, and hand it
//! to the validator and executor.
//!
//! # Usage
//!
//! ```ignore
//! use block_engine::{BlockRegistry, BlockDefinition};
//!
//! let mut registry = BlockRegistry::new();
//! registry.register(MyBlock::definition());
//! registry.register_executor("my-block", Arc::new(MyBlock));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::{BlockEngineError, Result};
use crate::types::{BlockCategory, BlockDefinition, BlockInputs, BlockOutputs};

/// Runtime behaviour of one block type
#[async_trait]
pub trait BlockExecutor: Send + Sync {
    /// Execute the block with its gathered inputs and configuration
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs>;
}

type BoxedCallback = Box<
    dyn Fn(String, BlockInputs, serde_json::Value) -> Pin<Box<dyn Future<Output = Result<BlockOutputs>> + Send>>
        + Send
        + Sync,
>;

/// Async callback-based executor
///
/// The callback receives (instance_id, inputs, config) and returns outputs.
pub struct CallbackBlockExecutor {
    callback: BoxedCallback,
}

#[async_trait]
impl BlockExecutor for CallbackBlockExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        (self.callback)(ctx.instance_id.to_string(), inputs, config.clone()).await
    }
}

/// Synchronous callback-based executor
pub struct SyncCallbackBlockExecutor {
    callback: Box<
        dyn Fn(&ExecutionContext<'_>, BlockInputs, &serde_json::Value) -> Result<BlockOutputs> + Send + Sync,
    >,
}

impl SyncCallbackBlockExecutor {
    pub fn new(
        callback: impl Fn(&ExecutionContext<'_>, BlockInputs, &serde_json::Value) -> Result<BlockOutputs>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl BlockExecutor for SyncCallbackBlockExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        (self.callback)(ctx, inputs, config)
    }
}

/// Registry of block definitions and their executors
///
/// Definitions and executors are registered independently so a block kind's
/// catalog metadata can be published before its behaviour is supplied.
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = BlockRegistry::new();
/// workflow_blocks::register_builtins(&mut registry, &config);
/// registry.merge(plugin_registry); // later entries win
/// ```
pub struct BlockRegistry {
    definitions: HashMap<String, BlockDefinition>,
    executors: HashMap<String, Arc<dyn BlockExecutor>>,
}

impl BlockRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            executors: HashMap::new(),
        }
    }

    /// Insert or overwrite a definition by its type identifier
    ///
    /// Overwriting is not an error; the last writer wins.
    pub fn register(&mut self, definition: BlockDefinition) {
        if self.definitions.contains_key(&definition.block_type) {
            log::warn!(
                "Overwriting existing definition for block type '{}'",
                definition.block_type
            );
        }
        self.definitions
            .insert(definition.block_type.clone(), definition);
    }

    /// Supply the runtime behaviour for a block type
    pub fn register_executor(&mut self, block_type: impl Into<String>, executor: Arc<dyn BlockExecutor>) {
        let block_type = block_type.into();
        if self.executors.insert(block_type.clone(), executor).is_some() {
            log::warn!("Replacing executor for block type '{}'", block_type);
        }
    }

    /// Register a definition together with its executor
    pub fn register_block(&mut self, definition: BlockDefinition, executor: Arc<dyn BlockExecutor>) {
        let block_type = definition.block_type.clone();
        self.register(definition);
        self.register_executor(block_type, executor);
    }

    /// Register an executor backed by an async closure
    pub fn register_fn<F, Fut>(&mut self, block_type: impl Into<String>, callback: F)
    where
        F: Fn(String, BlockInputs, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BlockOutputs>> + Send + 'static,
    {
        let executor = CallbackBlockExecutor {
            callback: Box::new(move |instance_id, inputs, config| {
                Box::pin(callback(instance_id, inputs, config))
            }),
        };
        self.register_executor(block_type, Arc::new(executor));
    }

    /// Register an executor backed by a synchronous closure
    pub fn register_sync_fn(
        &mut self,
        block_type: impl Into<String>,
        callback: impl Fn(&ExecutionContext<'_>, BlockInputs, &serde_json::Value) -> Result<BlockOutputs>
            + Send
            + Sync
            + 'static,
    ) {
        self.register_executor(block_type, Arc::new(SyncCallbackBlockExecutor::new(callback)));
    }

    /// Get the definition for a block type
    pub fn get(&self, block_type: &str) -> Result<&BlockDefinition> {
        self.definitions
            .get(block_type)
            .ok_or_else(|| BlockEngineError::UnknownBlockType(block_type.to_string()))
    }

    /// Check if a block type has a definition
    pub fn exists(&self, block_type: &str) -> bool {
        self.definitions.contains_key(block_type)
    }

    /// Check if a block type has an executor
    pub fn has_executor(&self, block_type: &str) -> bool {
        self.executors.contains_key(block_type)
    }

    /// Resolve the executor for a block type
    ///
    /// Fails with `UnknownBlockType` when the type has no definition and
    /// `NoExecutorRegistered` when it has metadata but no behaviour.
    pub fn executor(&self, block_type: &str) -> Result<Arc<dyn BlockExecutor>> {
        self.get(block_type)?;
        self.executors
            .get(block_type)
            .cloned()
            .ok_or_else(|| BlockEngineError::NoExecutorRegistered(block_type.to_string()))
    }

    /// All definitions, ordered by type identifier
    pub fn all_definitions(&self) -> Vec<&BlockDefinition> {
        let mut all: Vec<&BlockDefinition> = self.definitions.values().collect();
        all.sort_by(|a, b| a.block_type.cmp(&b.block_type));
        all
    }

    /// Definitions in one category, ordered by type identifier
    pub fn by_category(&self, category: BlockCategory) -> Vec<&BlockDefinition> {
        self.all_definitions()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// All definitions grouped by category
    pub fn definitions_by_category(&self) -> BTreeMap<BlockCategory, Vec<&BlockDefinition>> {
        let mut grouped: BTreeMap<BlockCategory, Vec<&BlockDefinition>> = BTreeMap::new();
        for definition in self.all_definitions() {
            grouped.entry(definition.category).or_default().push(definition);
        }
        grouped
    }

    /// List all registered block type identifiers
    pub fn block_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.definitions.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` that share a type.
    pub fn merge(&mut self, other: BlockRegistry) {
        self.definitions.extend(other.definitions);
        self.executors.extend(other.executors);
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::ExecutorExtensions;
    use crate::types::{InputPort, OutputPort, PortDataType};

    fn test_definition(block_type: &str) -> BlockDefinition {
        BlockDefinition::new(block_type, BlockCategory::Transformer, format!("Test {}", block_type))
            .with_description("Test block")
            .input(InputPort::optional("input", "Input", PortDataType::Text))
            .output(OutputPort::new("output", "Output", PortDataType::Text))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = BlockRegistry::new();
        let def = test_definition("test-block");
        registry.register(def.clone());

        assert!(registry.exists("test-block"));
        assert!(!registry.exists("unknown"));
        assert_eq!(registry.get("test-block").unwrap(), &def);
    }

    #[test]
    fn test_get_unknown_type() {
        let registry = BlockRegistry::new();
        let err = registry.get("nope").unwrap_err();
        assert!(matches!(err, BlockEngineError::UnknownBlockType(t) if t == "nope"));
    }

    #[test]
    fn test_overwrite_last_writer_wins() {
        let mut registry = BlockRegistry::new();
        registry.register(test_definition("a"));
        let mut replacement = test_definition("a");
        replacement.label = "Replacement".into();
        registry.register(replacement);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().label, "Replacement");
    }

    #[test]
    fn test_enumeration_and_categories() {
        let mut registry = BlockRegistry::new();
        registry.register(test_definition("b"));
        registry.register(test_definition("a"));
        let mut output = test_definition("c");
        output.category = BlockCategory::Output;
        registry.register(output);

        let all: Vec<&str> = registry.all_definitions().iter().map(|d| d.block_type.as_str()).collect();
        assert_eq!(all, vec!["a", "b", "c"]);
        assert_eq!(registry.by_category(BlockCategory::Transformer).len(), 2);
        assert_eq!(registry.by_category(BlockCategory::Output).len(), 1);
        assert!(registry.by_category(BlockCategory::Ai).is_empty());

        let grouped = registry.definitions_by_category();
        assert_eq!(grouped.get(&BlockCategory::Transformer).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_override() {
        let mut registry1 = BlockRegistry::new();
        let mut def1 = test_definition("node-a");
        def1.label = "Original".to_string();
        registry1.register(def1);

        let mut registry2 = BlockRegistry::new();
        let mut def2 = test_definition("node-a");
        def2.label = "Override".to_string();
        registry2.register(def2);
        registry2.register(test_definition("node-b"));

        registry1.merge(registry2);
        assert_eq!(registry1.len(), 2);
        assert_eq!(registry1.get("node-a").unwrap().label, "Override");
    }

    #[test]
    fn test_executor_resolution_errors() {
        let mut registry = BlockRegistry::new();
        registry.register(test_definition("metadata-only"));

        assert!(matches!(
            registry.executor("metadata-only"),
            Err(BlockEngineError::NoExecutorRegistered(_))
        ));
        assert!(matches!(
            registry.executor("missing"),
            Err(BlockEngineError::UnknownBlockType(_))
        ));
    }

    #[tokio::test]
    async fn test_register_sync_fn() {
        let mut registry = BlockRegistry::new();
        registry.register(test_definition("echo"));
        registry.register_sync_fn("echo", |ctx, inputs, _config| {
            let mut outputs = inputs;
            outputs.insert("by".into(), serde_json::json!(ctx.instance_id));
            Ok(outputs)
        });

        let executor = registry.executor("echo").unwrap();
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("echo-1", &ext);
        let mut inputs = BlockInputs::new();
        inputs.insert("value".into(), serde_json::json!("hello"));

        let result = executor.execute(&ctx, inputs, &serde_json::Value::Null).await.unwrap();
        assert_eq!(result["value"], "hello");
        assert_eq!(result["by"], "echo-1");
    }

    #[tokio::test]
    async fn test_register_async_fn_receives_config() {
        let mut registry = BlockRegistry::new();
        registry.register(test_definition("scale"));
        registry.register_fn("scale", |_id, inputs, config| async move {
            let factor = config.get("factor").and_then(|f| f.as_f64()).unwrap_or(1.0);
            let value = inputs.get("input").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let mut outputs = BlockOutputs::new();
            outputs.insert("output".into(), serde_json::json!(value * factor));
            Ok(outputs)
        });

        let executor = registry.executor("scale").unwrap();
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("s", &ext);
        let mut inputs = BlockInputs::new();
        inputs.insert("input".into(), serde_json::json!(4.0));

        let result = executor
            .execute(&ctx, inputs, &serde_json::json!({"factor": 2.5}))
            .await
            .unwrap();
        assert_eq!(result["output"], 10.0);
    }
}
