//! Block Engine - typed-port dataflow workflows
//!
//! This crate provides the core of a block workflow system. Users place
//! blocks on an external scene and connect output ports to input ports;
//! the engine validates the connections and runs the resulting graph. It
//! supports:
//!
//! - A closed port type set with a wildcard and a single compatibility predicate
//! - A registry of block definitions and executor functions, passed around explicitly
//! - Graph reconstruction from the scene on every query, with an optional revision cache
//! - Pre-flight validation collected as data (errors block runs, warnings do not)
//! - Sequential topological execution with fail-fast and cooperative cancellation
//!
//! # Architecture
//!
//! - `Scene`: the external source of truth for instances and connectors
//! - `WorkflowGraph`: bindings derived from the scene
//! - `WorkflowExecutor`: the per-block state machine and whole-graph walk
//! - `EventSink`: generic event streaming
//!
//! # Example
//!
//! ```ignore
//! use block_engine::{BlockRegistry, RunOptions, SceneBuilder, WorkflowExecutor};
//!
//! let mut registry = BlockRegistry::new();
//! workflow_blocks::register_builtins(&mut registry, &Default::default());
//!
//! let scene = SceneBuilder::new()
//!     .add_block("t", "manual-trigger")
//!     .add_block("out", "display")
//!     .connect("t", "payload", "out", "value")
//!     .build();
//!
//! let executor = WorkflowExecutor::new(Arc::new(registry));
//! let result = executor.execute_workflow(&scene, RunOptions::new()).await?;
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod extensions;
pub mod graph;
pub mod registry;
pub mod scene;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::SceneBuilder;
pub use config::{ConfigError, EngineConfig, ExecutionConfig, ValidationConfig};
pub use context::{AbortSignal, ExecutionContext};
pub use error::{BlockEngineError, Result};
pub use events::{EventError, EventSink, LogEventSink, NullEventSink, VecEventSink, WorkflowEvent};
pub use executor::{RunFailure, RunOptions, StepRecord, StepStatus, WorkflowExecutor, WorkflowRunResult};
pub use extensions::{extension_keys, ExecutorExtensions};
pub use graph::{ExecutionPlan, GraphCache, GraphNode, WorkflowGraph};
pub use registry::{BlockExecutor, BlockRegistry};
pub use scene::{state_summary, InMemoryScene, Scene, SceneSnapshot};
pub use types::{
    is_compatible, Binding, BlockCategory, BlockDefinition, BlockInputs, BlockInstance, BlockOutputs, Connector,
    ConnectorEndpoint, ExecutionState, InputPort, InstanceId, OutputPort, PortDataType, PortId,
};
pub use validation::{
    detect_cycles, validate_connection, validate_required_inputs, validate_workflow, CycleReport, IssueCode,
    ValidationIssue, ValidationResult,
};
