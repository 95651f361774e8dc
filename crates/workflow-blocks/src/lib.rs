//! Workflow Blocks
//!
//! Built-in block implementations for the block engine. Each block is a
//! type that describes itself ([`BlockDescriptor`]) and executes
//! ([`BlockExecutor`]).
//!
//! # Categories
//!
//! - **Trigger**: Blocks that start a workflow
//! - **Action**: HTTP requests and delays
//! - **Condition**: Branching and comparison
//! - **Transformer**: JSON, expressions, templates, paths and lists
//! - **AI**: Language-model, image and speech generation
//! - **Output**: Display, logging, notifications and notes

pub mod action;
pub mod ai;
pub mod condition;
pub mod config;
pub mod expression;
pub mod output;
pub mod ports;
pub mod setup;
pub mod transformer;
pub mod trigger;

use std::sync::Arc;

use block_engine::{BlockDefinition, BlockExecutor, BlockRegistry};

pub use action::*;
pub use ai::*;
pub use condition::*;
pub use config::{AiConfig, BlocksConfig, DelayConfig, HttpConfig};
pub use expression::ExpressionEvaluator;
pub use output::*;
pub use setup::{http_client, setup_extensions};
pub use transformer::*;
pub use trigger::*;

/// A block type that can describe its own definition
pub trait BlockDescriptor {
    fn definition() -> BlockDefinition;
}

fn register<B>(registry: &mut BlockRegistry, block: B)
where
    B: BlockDescriptor + BlockExecutor + 'static,
{
    registry.register_block(B::definition(), Arc::new(block));
}

/// Register every built-in block
pub fn register_builtins(registry: &mut BlockRegistry, config: &BlocksConfig) {
    let evaluator = Arc::new(ExpressionEvaluator::new());

    register(registry, ManualTriggerBlock);

    register(registry, HttpRequestBlock::new(config.http.clone()));
    register(registry, DelayBlock::new(config.delay.clone()));

    register(registry, IfBlock);
    register(registry, SwitchBlock);
    register(registry, CompareBlock);

    register(registry, JsonParseBlock);
    register(registry, JsonStringifyBlock);
    register(registry, CodeBlock::new(evaluator.clone()));
    register(registry, TemplateBlock::new(evaluator.clone()));
    register(registry, PropertyBlock);
    register(registry, ArrayBlock::new(evaluator));

    register(registry, LlmPromptBlock);
    register(registry, ImageGenerateBlock);
    register(registry, TextToSpeechBlock);

    register(registry, DisplayBlock);
    register(registry, LogBlock);
    register(registry, NotifyBlock);
    register(registry, MarkdownBlock);
    register(registry, NoteBlock);

    log::debug!("Registered {} built-in blocks", registry.len());
}

/// A registry holding only the built-in blocks
pub fn builtin_registry(config: &BlocksConfig) -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    register_builtins(&mut registry, config);
    registry
}
