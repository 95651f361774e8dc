//! Block and workflow execution
//!
//! Drives the per-instance state machine (`idle → running → {success,
//! error}`) and walks the graph in topological order, one block at a time.
//!
//! # Key Concepts
//!
//! - **Gathering**: each input comes from the bound upstream output cache,
//!   then the static input, then the port default; caller-supplied extra
//!   inputs override all of them
//! - **Fail-fast**: a whole-graph run halts at the first failing block and
//!   leaves later blocks untouched
//! - **Cooperative cancellation**: the abort signal is checked before each
//!   block; a block that notices it and returns `Cancelled` ends the run as
//!   cancelled, not failed
//! - **Live reads**: the graph is rebuilt from the scene for every run, and
//!   upstream outputs are read from the scene when a block starts

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::{AbortSignal, ExecutionContext};
use crate::error::{BlockEngineError, Result};
use crate::events::{EventSink, NullEventSink, WorkflowEvent};
use crate::extensions::ExecutorExtensions;
use crate::graph::{GraphCache, WorkflowGraph};
use crate::registry::BlockRegistry;
use crate::scene::Scene;
use crate::types::{Binding, BlockDefinition, BlockInputs, BlockInstance, BlockOutputs, ExecutionState, InstanceId};
use crate::validation::{
    cycle_issue, detect_cycles, validate_workflow, IssueCode, ValidationIssue, ValidationResult,
};

/// Callback invoked with `(completed, total)` after each successful block
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Options for a whole-graph run
#[derive(Default)]
pub struct RunOptions {
    /// Run only the suffix of the order beginning at this instance
    pub start_instance_id: Option<InstanceId>,
    pub abort_signal: Option<AbortSignal>,
    pub on_progress: Option<ProgressCallback>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(mut self, instance_id: impl Into<String>) -> Self {
        self.start_instance_id = Some(instance_id.into());
        self
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }
}

/// What happened to one instance during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    /// Scheduled but never attempted (after a failure, a cancellation, or a refused run)
    NotRun,
    /// Before the start instance of a partial run
    SkippedBeforeStart,
    /// Excluded from the order because it sits on or behind a cycle
    SkippedDueToCycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub instance_id: InstanceId,
    pub status: StepStatus,
}

impl StepRecord {
    fn new(instance_id: impl Into<String>, status: StepStatus) -> Self {
        Self {
            instance_id: instance_id.into(),
            status,
        }
    }
}

/// Reason a run did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunFailure {
    /// Pre-flight validation found errors, nothing was executed
    Validation { errors: Vec<ValidationIssue> },
    /// A block failed and the run halted
    #[serde(rename_all = "camelCase")]
    BlockFailed { instance_id: InstanceId, message: String },
    /// The abort signal was raised
    Cancelled { completed: usize },
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { errors } => {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "Validation failed: {}", messages.join("; "))
            }
            Self::BlockFailed { instance_id, message } => {
                write!(f, "Block '{}' failed: {}", instance_id, message)
            }
            Self::Cancelled { completed } => {
                write!(f, "Cancelled after {} completed blocks", completed)
            }
        }
    }
}

/// Result of a whole-graph or downstream run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunResult {
    pub run_id: String,
    pub success: bool,
    /// Full topological order of the graph
    pub order: Vec<InstanceId>,
    pub steps: Vec<StepRecord>,
    pub completed: usize,
    /// Number of blocks scheduled for this run
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    pub validation: ValidationResult,
}

impl WorkflowRunResult {
    /// Status recorded for one instance
    pub fn status_of(&self, instance_id: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|s| s.instance_id == instance_id)
            .map(|s| s.status)
    }

    /// The instance that failed, if the run halted on a block failure
    pub fn failed_instance(&self) -> Option<&str> {
        match &self.failure {
            Some(RunFailure::BlockFailed { instance_id, .. }) => Some(instance_id),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, Some(RunFailure::Cancelled { .. }))
    }
}

/// Executes block instances of a scene
///
/// Holds the registry and collaborators; the scene is passed per call so
/// one executor can serve several scenes. With a graph cache it serves one
/// scene only.
pub struct WorkflowExecutor {
    registry: Arc<BlockRegistry>,
    extensions: Arc<ExecutorExtensions>,
    event_sink: Arc<dyn EventSink>,
    config: EngineConfig,
    graph_cache: Option<GraphCache>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            extensions: Arc::new(ExecutorExtensions::new()),
            event_sink: Arc::new(NullEventSink),
            config: EngineConfig::default(),
            graph_cache: None,
        }
    }

    pub fn with_extensions(mut self, extensions: ExecutorExtensions) -> Self {
        self.extensions = Arc::new(extensions);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Reuse the reconstructed graph while the scene revision is unchanged
    pub fn with_graph_cache(mut self) -> Self {
        self.graph_cache = Some(GraphCache::new());
        self
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn graph(&self, scene: &dyn Scene) -> Arc<WorkflowGraph> {
        match &self.graph_cache {
            Some(cache) => cache.graph(scene, &self.registry),
            None => Arc::new(WorkflowGraph::from_scene(scene, &self.registry)),
        }
    }

    /// Validate the scene as a run would
    pub fn validate(&self, scene: &dyn Scene) -> ValidationResult {
        let graph = self.graph(scene);
        self.validate_graph(&scene.instances(), &graph)
    }

    fn validate_graph(&self, instances: &[BlockInstance], graph: &WorkflowGraph) -> ValidationResult {
        let validation = validate_workflow(&self.registry, instances, graph);
        if self.config.validation.warnings_as_errors {
            validation.promote_warnings()
        } else {
            validation
        }
    }

    /// Execute a single block instance
    ///
    /// The outputs are stored in the instance's output cache. An error is
    /// recorded on the instance before it is returned.
    pub async fn execute_block(
        &self,
        scene: &dyn Scene,
        instance_id: &str,
        extra_inputs: Option<BlockInputs>,
    ) -> Result<BlockOutputs> {
        let graph = self.graph(scene);
        let run_id = Uuid::new_v4().to_string();
        self.run_block(scene, &graph, instance_id, extra_inputs, &run_id, None)
            .await
    }

    /// Compute the inputs an instance would receive if it ran now
    pub fn gather_inputs(&self, scene: &dyn Scene, instance_id: &str) -> Result<BlockInputs> {
        let instance = scene
            .instance(instance_id)
            .ok_or_else(|| BlockEngineError::InstanceNotFound(instance_id.to_string()))?;
        let definition = self.registry.get(&instance.block_type)?;
        let graph = self.graph(scene);
        Ok(collect_inputs(scene, &graph, &instance, definition, None))
    }

    /// Execute the whole workflow in topological order
    ///
    /// Returns `Err` only when the start instance does not exist. Validation
    /// errors, block failures and cancellation are reported in the result.
    pub async fn execute_workflow(&self, scene: &dyn Scene, options: RunOptions) -> Result<WorkflowRunResult> {
        let run_id = Uuid::new_v4().to_string();
        let instances = scene.instances();
        let graph = self.graph(scene);
        let plan = graph.execution_order();
        let validation = self.validate_graph(&instances, &graph);

        if !validation.valid {
            let mut steps: Vec<StepRecord> = plan
                .order
                .iter()
                .map(|id| StepRecord::new(id, StepStatus::NotRun))
                .collect();
            steps.extend(
                plan.cyclic
                    .iter()
                    .map(|id| StepRecord::new(id, StepStatus::SkippedDueToCycle)),
            );
            return Ok(self.refuse(run_id, plan.order, steps, validation));
        }

        let start = match &options.start_instance_id {
            Some(id) => plan
                .position(id)
                .ok_or_else(|| BlockEngineError::InstanceNotFound(id.clone()))?,
            None => 0,
        };

        let steps: Vec<StepRecord> = plan.order[..start]
            .iter()
            .map(|id| StepRecord::new(id, StepStatus::SkippedBeforeStart))
            .collect();
        let scheduled = plan.order[start..].to_vec();

        if self.config.execution.reset_before_run {
            self.reset_instances(scene, &scheduled)?;
        }

        Ok(self
            .run_scheduled(scene, &graph, run_id, plan.order, steps, scheduled, &options, validation)
            .await)
    }

    /// Execute an instance and everything transitively downstream of it
    ///
    /// Validation issues are scoped to the affected instances, so an
    /// unrelated half-edited part of the scene does not block propagation.
    /// An affected instance on or behind a cycle always refuses the run.
    pub async fn execute_downstream(
        &self,
        scene: &dyn Scene,
        instance_id: &str,
        options: RunOptions,
    ) -> Result<WorkflowRunResult> {
        let run_id = Uuid::new_v4().to_string();
        let instances = scene.instances();
        if !instances.iter().any(|i| i.id == instance_id) {
            return Err(BlockEngineError::InstanceNotFound(instance_id.to_string()));
        }

        let graph = self.graph(scene);
        let affected = graph.downstream_closure(instance_id);
        let plan = graph.execution_order();

        let mut validation = self.validate_graph(&instances, &graph);
        scope_to(&mut validation, &affected);
        if let Some(issue) = affected_cycle(&graph, &plan.cyclic, &affected) {
            if !validation.has_code(IssueCode::CycleDetected) {
                validation.error(issue);
            }
        }

        let scheduled: Vec<InstanceId> = plan
            .order
            .iter()
            .filter(|id| affected.contains(*id))
            .cloned()
            .collect();
        let cyclic: Vec<StepRecord> = plan
            .cyclic
            .iter()
            .filter(|id| affected.contains(*id))
            .map(|id| StepRecord::new(id, StepStatus::SkippedDueToCycle))
            .collect();

        if !validation.valid {
            let mut steps: Vec<StepRecord> = scheduled
                .iter()
                .map(|id| StepRecord::new(id, StepStatus::NotRun))
                .collect();
            steps.extend(cyclic);
            return Ok(self.refuse(run_id, plan.order, steps, validation));
        }

        let mut result = self
            .run_scheduled(scene, &graph, run_id, plan.order, Vec::new(), scheduled, &options, validation)
            .await;
        result.steps.extend(cyclic);
        Ok(result)
    }

    /// Return every instance to idle, clearing outputs and errors
    ///
    /// Idempotent. Returns the number of instances reset.
    pub fn reset_workflow(&self, scene: &dyn Scene) -> Result<usize> {
        let ids: Vec<InstanceId> = scene.instances().into_iter().map(|i| i.id).collect();
        self.reset_instances(scene, &ids)?;
        self.emit(WorkflowEvent::WorkflowReset { instances: ids.len() });
        log::debug!("Reset {} instances", ids.len());
        Ok(ids.len())
    }

    fn reset_instances(&self, scene: &dyn Scene, ids: &[InstanceId]) -> Result<()> {
        for id in ids {
            scene.set_outputs(id, BlockOutputs::new())?;
            scene.set_error(id, None)?;
            scene.set_execution_state(id, ExecutionState::Idle)?;
        }
        Ok(())
    }

    fn refuse(
        &self,
        run_id: String,
        order: Vec<InstanceId>,
        steps: Vec<StepRecord>,
        validation: ValidationResult,
    ) -> WorkflowRunResult {
        let failure = RunFailure::Validation {
            errors: validation.errors.clone(),
        };
        log::warn!("Run {} refused: {}", run_id, failure);
        self.emit(WorkflowEvent::WorkflowFailed {
            run_id: run_id.clone(),
            error: failure.to_string(),
        });

        WorkflowRunResult {
            run_id,
            success: false,
            order,
            steps,
            completed: 0,
            total: 0,
            failure: Some(failure),
            validation,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_scheduled(
        &self,
        scene: &dyn Scene,
        graph: &WorkflowGraph,
        run_id: String,
        order: Vec<InstanceId>,
        mut steps: Vec<StepRecord>,
        scheduled: Vec<InstanceId>,
        options: &RunOptions,
        validation: ValidationResult,
    ) -> WorkflowRunResult {
        let total = scheduled.len();
        let mut completed = 0;
        let mut failure = None;
        let abort = options.abort_signal.as_ref();

        log::info!("Starting run {} with {} blocks", run_id, total);
        self.emit(WorkflowEvent::WorkflowStarted {
            run_id: run_id.clone(),
            total,
        });

        let mut remaining = scheduled.into_iter();
        while let Some(id) = remaining.next() {
            if abort.map(AbortSignal::is_aborted).unwrap_or(false) {
                steps.push(StepRecord::new(id, StepStatus::NotRun));
                steps.extend(remaining.by_ref().map(|id| StepRecord::new(id, StepStatus::NotRun)));
                failure = Some(self.cancelled(&run_id, completed));
                break;
            }

            match self.run_block(scene, graph, &id, None, &run_id, abort).await {
                Ok(_) => {
                    completed += 1;
                    steps.push(StepRecord::new(id, StepStatus::Completed));
                    if let Some(on_progress) = &options.on_progress {
                        on_progress(completed, total);
                    }
                    self.emit(WorkflowEvent::WorkflowProgress {
                        run_id: run_id.clone(),
                        completed,
                        total,
                    });
                }
                Err(BlockEngineError::Cancelled) => {
                    steps.push(StepRecord::new(id, StepStatus::NotRun));
                    steps.extend(remaining.by_ref().map(|id| StepRecord::new(id, StepStatus::NotRun)));
                    failure = Some(self.cancelled(&run_id, completed));
                    break;
                }
                Err(e) => {
                    let block_failure = RunFailure::BlockFailed {
                        instance_id: id.clone(),
                        message: e.to_string(),
                    };
                    steps.push(StepRecord::new(id, StepStatus::Failed));
                    steps.extend(remaining.by_ref().map(|id| StepRecord::new(id, StepStatus::NotRun)));
                    self.emit(WorkflowEvent::WorkflowFailed {
                        run_id: run_id.clone(),
                        error: block_failure.to_string(),
                    });
                    failure = Some(block_failure);
                    break;
                }
            }
        }

        if failure.is_none() {
            log::info!("Run {} completed {} blocks", run_id, completed);
            self.emit(WorkflowEvent::WorkflowCompleted {
                run_id: run_id.clone(),
                completed,
            });
        }

        WorkflowRunResult {
            run_id,
            success: failure.is_none(),
            order,
            steps,
            completed,
            total,
            failure,
            validation,
        }
    }

    fn cancelled(&self, run_id: &str, completed: usize) -> RunFailure {
        log::info!("Run {} cancelled after {} blocks", run_id, completed);
        self.emit(WorkflowEvent::WorkflowCancelled {
            run_id: run_id.to_string(),
            completed,
        });
        RunFailure::Cancelled { completed }
    }

    async fn run_block(
        &self,
        scene: &dyn Scene,
        graph: &WorkflowGraph,
        instance_id: &str,
        extra_inputs: Option<BlockInputs>,
        run_id: &str,
        abort: Option<&AbortSignal>,
    ) -> Result<BlockOutputs> {
        let instance = scene
            .instance(instance_id)
            .ok_or_else(|| BlockEngineError::InstanceNotFound(instance_id.to_string()))?;

        let resolved = self.registry.get(&instance.block_type).and_then(|definition| {
            let executor = self.registry.executor(&instance.block_type)?;
            Ok((definition, executor))
        });
        let (definition, executor) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                self.record_failure(scene, instance_id, &e, run_id)?;
                return Err(e);
            }
        };

        scene.set_execution_state(instance_id, ExecutionState::Running)?;
        self.emit(WorkflowEvent::BlockStarted {
            run_id: run_id.to_string(),
            instance_id: instance_id.to_string(),
        });

        let inputs = collect_inputs(scene, graph, &instance, definition, extra_inputs);
        log::debug!(
            "Executing '{}' ({}) with inputs {:?}",
            instance_id,
            instance.block_type,
            inputs.keys().collect::<Vec<_>>()
        );

        let ctx = ExecutionContext::new(instance_id, &self.extensions).with_abort_signal(abort);
        match executor.execute(&ctx, inputs, &instance.config).await {
            Ok(outputs) => {
                scene.set_outputs(instance_id, outputs.clone())?;
                scene.set_error(instance_id, None)?;
                scene.set_execution_state(instance_id, ExecutionState::Success)?;
                self.emit(WorkflowEvent::BlockCompleted {
                    run_id: run_id.to_string(),
                    instance_id: instance_id.to_string(),
                    outputs: serde_json::Value::Object(outputs.clone().into_iter().collect()),
                });
                Ok(outputs)
            }
            Err(BlockEngineError::Cancelled) => {
                log::debug!("Block '{}' stopped on abort", instance_id);
                scene.set_execution_state(instance_id, ExecutionState::Idle)?;
                Err(BlockEngineError::Cancelled)
            }
            Err(e) => {
                self.record_failure(scene, instance_id, &e, run_id)?;
                Err(e)
            }
        }
    }

    fn record_failure(
        &self,
        scene: &dyn Scene,
        instance_id: &str,
        error: &BlockEngineError,
        run_id: &str,
    ) -> Result<()> {
        log::error!("Block '{}' failed: {}", instance_id, error);
        scene.set_error(instance_id, Some(error.to_string()))?;
        scene.set_execution_state(instance_id, ExecutionState::Error)?;
        self.emit(WorkflowEvent::BlockFailed {
            run_id: run_id.to_string(),
            instance_id: instance_id.to_string(),
            error: error.to_string(),
        });
        Ok(())
    }

    fn emit(&self, event: WorkflowEvent) {
        if !self.config.execution.emit_events {
            return;
        }
        if let Err(e) = self.event_sink.send(event) {
            log::warn!("Failed to send workflow event: {}", e);
        }
    }
}

/// Gather the inputs for one instance
///
/// Per port: the bound upstream output if the upstream cache holds it, else
/// the static input, else the port default. Extra inputs override all.
fn collect_inputs(
    scene: &dyn Scene,
    graph: &WorkflowGraph,
    instance: &BlockInstance,
    definition: &BlockDefinition,
    extra_inputs: Option<BlockInputs>,
) -> BlockInputs {
    let mut inputs = BlockInputs::new();

    for port in &definition.inputs {
        let bound = graph
            .input_binding_for(&instance.id, &port.id)
            .and_then(|binding| {
                scene
                    .instance(&binding.source_instance)
                    .and_then(|upstream| upstream.outputs.get(&binding.source_port).cloned())
            });

        let value = bound
            .or_else(|| instance.static_inputs.get(&port.id).cloned())
            .or_else(|| port.default_value.clone());

        if let Some(value) = value {
            inputs.insert(port.id.clone(), value);
        }
    }

    if let Some(extra) = extra_inputs {
        inputs.extend(extra);
    }

    inputs
}

/// A `cycle_detected` error when any affected instance could not be ordered
fn affected_cycle(
    graph: &WorkflowGraph,
    cyclic: &[InstanceId],
    affected: &HashSet<InstanceId>,
) -> Option<ValidationIssue> {
    let blocked: Vec<&str> = cyclic
        .iter()
        .filter(|id| affected.contains(*id))
        .map(String::as_str)
        .collect();
    let first = blocked.first()?;

    let scoped: Vec<Binding> = graph
        .all_bindings()
        .iter()
        .filter(|b| affected.contains(&b.source_instance) && affected.contains(&b.target_instance))
        .cloned()
        .collect();
    let issue = match detect_cycles(&scoped).cycle_nodes {
        Some(path) => cycle_issue(&path),
        None => ValidationIssue::new(
            IssueCode::CycleDetected,
            format!("Behind a cycle upstream: {}", blocked.join(", ")),
        )
        .on_instance(*first),
    };
    Some(issue)
}

/// Keep only issues that concern the given instances or no instance at all
fn scope_to(validation: &mut ValidationResult, instances: &HashSet<InstanceId>) {
    let relevant = |issue: &ValidationIssue| {
        issue
            .instance_id
            .as_ref()
            .map(|id| instances.contains(id))
            .unwrap_or(true)
    };
    validation.errors.retain(relevant);
    validation.warnings.retain(relevant);
    validation.valid = validation.errors.is_empty();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::events::VecEventSink;
    use crate::scene::InMemoryScene;
    use crate::types::{BlockCategory, Connector, InputPort, OutputPort, PortDataType};

    struct Fixture {
        executor: WorkflowExecutor,
        double_inputs: Arc<Mutex<Vec<BlockInputs>>>,
        source_calls: Arc<AtomicUsize>,
    }

    fn fixture_with(config: EngineConfig, sink: Arc<dyn EventSink>) -> Fixture {
        let double_inputs = Arc::new(Mutex::new(Vec::new()));
        let source_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = BlockRegistry::new();

        registry.register(
            BlockDefinition::new("source", BlockCategory::Trigger, "Source")
                .output(OutputPort::new("out", "Out", PortDataType::Number)),
        );
        let calls = source_calls.clone();
        registry.register_sync_fn("source", move |_ctx, _inputs, config| {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut outputs = BlockOutputs::new();
            outputs.insert("out".into(), config.get("value").cloned().unwrap_or(json!(10)));
            Ok(outputs)
        });

        registry.register(
            BlockDefinition::new("double", BlockCategory::Transformer, "Double")
                .input(InputPort::required("in", "In", PortDataType::Number))
                .output(OutputPort::new("out2", "Out", PortDataType::Number)),
        );
        let seen = double_inputs.clone();
        registry.register_sync_fn("double", move |_ctx, inputs, _config| {
            seen.lock().push(inputs.clone());
            let value = inputs
                .get("in")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| BlockEngineError::invalid_input("in", "integer"))?;
            let mut outputs = BlockOutputs::new();
            outputs.insert("out2".into(), json!(value * 2));
            Ok(outputs)
        });

        registry.register(
            BlockDefinition::new("fail", BlockCategory::Transformer, "Fail")
                .input(InputPort::optional("in", "In", PortDataType::Any).accepting([PortDataType::Any]))
                .output(OutputPort::new("out", "Out", PortDataType::Number)),
        );
        registry.register_sync_fn("fail", |_ctx, _inputs, _config| Err(BlockEngineError::failed("boom")));

        registry.register(
            BlockDefinition::new("stopper", BlockCategory::Trigger, "Stopper")
                .output(OutputPort::new("out", "Out", PortDataType::Number)),
        );
        registry.register_sync_fn("stopper", |ctx, _inputs, _config| {
            if let Some(signal) = ctx.abort_signal {
                signal.abort();
            }
            let mut outputs = BlockOutputs::new();
            outputs.insert("out".into(), json!(1));
            Ok(outputs)
        });

        registry.register(
            BlockDefinition::new("canceller", BlockCategory::Action, "Canceller")
                .input(InputPort::optional("in", "In", PortDataType::Any).accepting([PortDataType::Any]))
                .output(OutputPort::new("out", "Out", PortDataType::Number)),
        );
        registry.register_sync_fn("canceller", |ctx, _inputs, _config| {
            if let Some(signal) = ctx.abort_signal {
                signal.abort();
            }
            Err(BlockEngineError::Cancelled)
        });

        registry.register(
            BlockDefinition::new("pair", BlockCategory::Transformer, "Pair")
                .input(InputPort::optional("in", "In", PortDataType::Any).accepting([PortDataType::Any]))
                .input(InputPort::optional("loop", "Loop", PortDataType::Any).accepting([PortDataType::Any]))
                .output(OutputPort::new("out", "Out", PortDataType::Any)),
        );
        registry.register_sync_fn("pair", |_ctx, inputs, _config| {
            let mut outputs = BlockOutputs::new();
            outputs.insert("out".into(), inputs.get("in").cloned().unwrap_or(json!(null)));
            Ok(outputs)
        });

        registry.register(BlockDefinition::new("metadata-only", BlockCategory::Output, "Nothing"));

        Fixture {
            executor: WorkflowExecutor::new(Arc::new(registry))
                .with_config(config)
                .with_event_sink(sink),
            double_inputs,
            source_calls,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(EngineConfig::default(), Arc::new(NullEventSink))
    }

    fn chain(types: &[(&str, &str)], ports: &[(&str, &str)]) -> InMemoryScene {
        let scene = InMemoryScene::new();
        for (id, block_type) in types {
            scene.create_instance(BlockInstance::new(*id, *block_type)).unwrap();
        }
        for (i, window) in types.windows(2).enumerate() {
            let (out_port, in_port) = ports[i];
            scene.add_connector(Connector::new(
                format!("c{}", i),
                window[0].0,
                out_port,
                window[1].0,
                in_port,
            ));
        }
        scene
    }

    fn source_double() -> InMemoryScene {
        chain(&[("a", "source"), ("b", "double")], &[("out", "in")])
    }

    #[tokio::test]
    async fn test_data_propagates_along_binding() {
        let f = fixture();
        let scene = source_double();

        let result = f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert!(result.success, "{:?}", result.failure);
        assert_eq!(result.order, vec!["a", "b"]);
        assert_eq!(result.completed, 2);

        let gathered = f.double_inputs.lock()[0].clone();
        assert_eq!(gathered.len(), 1);
        assert_eq!(gathered["in"], json!(10));

        let b = scene.instance("b").unwrap();
        assert_eq!(b.outputs["out2"], json!(20));
        assert_eq!(b.state, ExecutionState::Success);
        assert_eq!(f.executor.gather_inputs(&scene, "b").unwrap()["in"], json!(10));
    }

    #[tokio::test]
    async fn test_fail_fast_leaves_later_blocks_untouched() {
        let f = fixture();
        let scene = chain(
            &[("a", "source"), ("b", "fail"), ("c", "double")],
            &[("out", "in"), ("out", "in")],
        );
        scene.set_execution_state("c", ExecutionState::Success).unwrap();
        let mut previous = BlockOutputs::new();
        previous.insert("out2".into(), json!(4));
        scene.set_outputs("c", previous.clone()).unwrap();

        let result = f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_instance(), Some("b"));
        assert_eq!(result.status_of("a"), Some(StepStatus::Completed));
        assert_eq!(result.status_of("b"), Some(StepStatus::Failed));
        assert_eq!(result.status_of("c"), Some(StepStatus::NotRun));

        let b = scene.instance("b").unwrap();
        assert_eq!(b.state, ExecutionState::Error);
        assert!(b.error.unwrap().contains("boom"));

        let c = scene.instance("c").unwrap();
        assert_eq!(c.state, ExecutionState::Success);
        assert_eq!(c.outputs, previous);
        assert!(f.double_inputs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let f = fixture();
        let scene = chain(&[("a", "source"), ("b", "fail")], &[("out", "in")]);
        f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();

        f.executor.reset_workflow(&scene).unwrap();
        let once = scene.snapshot();
        f.executor.reset_workflow(&scene).unwrap();
        assert_eq!(scene.snapshot(), once);

        for instance in scene.instances() {
            assert_eq!(instance.state, ExecutionState::Idle);
            assert!(instance.outputs.is_empty());
            assert!(instance.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_validation_errors_refuse_run() {
        let f = fixture();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("a", "source")).unwrap();
        scene.create_instance(BlockInstance::new("lonely", "double")).unwrap();

        let result = f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert!(!result.success);
        assert!(matches!(result.failure, Some(RunFailure::Validation { ref errors }) if !errors.is_empty()));
        assert_eq!(result.completed, 0);
        assert_eq!(f.source_calls.load(Ordering::SeqCst), 0);
        assert_eq!(scene.instance("a").unwrap().state, ExecutionState::Idle);
    }

    #[tokio::test]
    async fn test_cycle_members_are_reported_separately() {
        let f = fixture();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("a", "source")).unwrap();
        scene.create_instance(BlockInstance::new("x", "fail")).unwrap();
        scene.create_instance(BlockInstance::new("y", "fail")).unwrap();
        scene.add_connector(Connector::new("c1", "x", "out", "y", "in"));
        scene.add_connector(Connector::new("c2", "y", "out", "x", "in"));

        let result = f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.status_of("a"), Some(StepStatus::NotRun));
        assert_eq!(result.status_of("x"), Some(StepStatus::SkippedDueToCycle));
        assert_eq!(result.status_of("y"), Some(StepStatus::SkippedDueToCycle));
    }

    #[tokio::test]
    async fn test_warnings_as_errors() {
        let mut config = EngineConfig::default();
        config.validation.warnings_as_errors = true;
        let f = fixture_with(config, Arc::new(NullEventSink));
        // b.out2 is unused, which is only a warning
        let result = f.executor.execute_workflow(&source_double(), RunOptions::new()).await.unwrap();
        assert!(!result.success);
        assert!(matches!(result.failure, Some(RunFailure::Validation { .. })));
    }

    #[tokio::test]
    async fn test_start_instance_runs_suffix_only() {
        let f = fixture();
        let scene = source_double();
        f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert_eq!(f.source_calls.load(Ordering::SeqCst), 1);

        let mut cached = BlockOutputs::new();
        cached.insert("out".into(), json!(21));
        scene.set_outputs("a", cached).unwrap();

        let result = f
            .executor
            .execute_workflow(&scene, RunOptions::new().starting_at("b"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.total, 1);
        assert_eq!(result.status_of("a"), Some(StepStatus::SkippedBeforeStart));
        assert_eq!(f.source_calls.load(Ordering::SeqCst), 1);
        assert_eq!(scene.instance("b").unwrap().outputs["out2"], json!(42));
    }

    #[tokio::test]
    async fn test_unknown_start_instance_is_error() {
        let f = fixture();
        let err = f
            .executor
            .execute_workflow(&source_double(), RunOptions::new().starting_at("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlockEngineError::InstanceNotFound(_)));
    }

    #[tokio::test]
    async fn test_abort_before_start_cancels_everything() {
        let f = fixture();
        let signal = AbortSignal::new();
        signal.abort();

        let result = f
            .executor
            .execute_workflow(&source_double(), RunOptions::new().with_abort_signal(signal))
            .await
            .unwrap();
        assert!(result.is_cancelled());
        assert_eq!(result.failure, Some(RunFailure::Cancelled { completed: 0 }));
        assert!(result.steps.iter().all(|s| s.status == StepStatus::NotRun));
        assert_eq!(f.source_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_abort_is_checked_between_blocks() {
        let f = fixture();
        let scene = chain(&[("s", "stopper"), ("b", "double")], &[("out", "in")]);

        let result = f
            .executor
            .execute_workflow(&scene, RunOptions::new().with_abort_signal(AbortSignal::new()))
            .await
            .unwrap();
        assert_eq!(result.failure, Some(RunFailure::Cancelled { completed: 1 }));
        assert_eq!(result.status_of("s"), Some(StepStatus::Completed));
        assert_eq!(result.status_of("b"), Some(StepStatus::NotRun));
        assert_eq!(scene.instance("b").unwrap().state, ExecutionState::Idle);
    }

    #[tokio::test]
    async fn test_progress_callback_and_events() {
        let sink = Arc::new(VecEventSink::new());
        let f = fixture_with(EngineConfig::default(), sink.clone());
        let progress = Arc::new(Mutex::new(Vec::new()));
        let recorded = progress.clone();

        let result = f
            .executor
            .execute_workflow(
                &source_double(),
                RunOptions::new().on_progress(move |done, total| recorded.lock().push((done, total))),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(*progress.lock(), vec![(1, 2), (2, 2)]);

        let events = sink.events();
        assert!(matches!(events.first(), Some(WorkflowEvent::WorkflowStarted { total: 2, .. })));
        assert!(matches!(events.last(), Some(WorkflowEvent::WorkflowCompleted { completed: 2, .. })));
        let started: Vec<&str> = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::BlockStarted { .. }))
            .filter_map(|e| e.instance_id())
            .collect();
        assert_eq!(started, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_events_can_be_disabled() {
        let sink = Arc::new(VecEventSink::new());
        let mut config = EngineConfig::default();
        config.execution.emit_events = false;
        let f = fixture_with(config, sink.clone());

        f.executor.execute_workflow(&source_double(), RunOptions::new()).await.unwrap();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_execute_block_records_fatal_resolution_errors() {
        let f = fixture();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("u", "unregistered")).unwrap();
        scene.create_instance(BlockInstance::new("m", "metadata-only")).unwrap();

        let err = f.executor.execute_block(&scene, "u", None).await.unwrap_err();
        assert!(matches!(err, BlockEngineError::UnknownBlockType(_)));
        let u = scene.instance("u").unwrap();
        assert_eq!(u.state, ExecutionState::Error);
        assert!(u.outputs.is_empty());

        let err = f.executor.execute_block(&scene, "m", None).await.unwrap_err();
        assert!(matches!(err, BlockEngineError::NoExecutorRegistered(_)));
        assert_eq!(scene.instance("m").unwrap().state, ExecutionState::Error);

        let err = f.executor.execute_block(&scene, "ghost", None).await.unwrap_err();
        assert!(matches!(err, BlockEngineError::InstanceNotFound(_)));
    }

    #[tokio::test]
    async fn test_input_precedence() {
        let f = fixture();
        let scene = InMemoryScene::new();
        scene
            .create_instance(BlockInstance::new("b", "double").with_static_input("in", json!(3)))
            .unwrap();

        let outputs = f.executor.execute_block(&scene, "b", None).await.unwrap();
        assert_eq!(outputs["out2"], json!(6));

        let mut extra = BlockInputs::new();
        extra.insert("in".into(), json!(50));
        let outputs = f.executor.execute_block(&scene, "b", Some(extra)).await.unwrap();
        assert_eq!(outputs["out2"], json!(100));

        // A bound upstream output wins over the static value once it exists
        scene.create_instance(BlockInstance::new("a", "source")).unwrap();
        scene.add_connector(Connector::new("c", "a", "out", "b", "in"));
        assert_eq!(f.executor.gather_inputs(&scene, "b").unwrap()["in"], json!(3));
        f.executor.execute_block(&scene, "a", None).await.unwrap();
        assert_eq!(f.executor.gather_inputs(&scene, "b").unwrap()["in"], json!(10));
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let f = fixture();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("b", "double")).unwrap();

        assert!(f.executor.execute_block(&scene, "b", None).await.is_err());
        assert!(scene.instance("b").unwrap().error.is_some());

        scene.set_static_input("b", "in", json!(1)).unwrap();
        f.executor.execute_block(&scene, "b", None).await.unwrap();
        let b = scene.instance("b").unwrap();
        assert_eq!(b.state, ExecutionState::Success);
        assert!(b.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_downstream_runs_affected_blocks_only() {
        let f = fixture();
        let scene = chain(
            &[("a", "source"), ("b", "double"), ("c", "double")],
            &[("out", "in"), ("out2", "in")],
        );
        scene.create_instance(BlockInstance::new("other", "source")).unwrap();
        f.executor.execute_block(&scene, "a", None).await.unwrap();
        let calls_before = f.source_calls.load(Ordering::SeqCst);

        let result = f
            .executor
            .execute_downstream(&scene, "b", RunOptions::new())
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.failure);
        assert_eq!(result.total, 2);
        assert_eq!(result.status_of("b"), Some(StepStatus::Completed));
        assert_eq!(result.status_of("c"), Some(StepStatus::Completed));
        assert_eq!(result.status_of("a"), None);
        assert_eq!(f.source_calls.load(Ordering::SeqCst), calls_before);
        assert_eq!(scene.instance("c").unwrap().outputs["out2"], json!(40));
    }

    #[tokio::test]
    async fn test_reset_before_run_config() {
        let mut config = EngineConfig::default();
        config.execution.reset_before_run = true;
        let f = fixture_with(config, Arc::new(NullEventSink));
        let scene = chain(&[("a", "source"), ("b", "fail")], &[("out", "in")]);
        scene.set_error("a", Some("stale".into())).unwrap();

        f.executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert!(scene.instance("a").unwrap().error.is_none());
    }

    #[tokio::test]
    async fn test_block_cancellation_ends_run_as_cancelled() {
        let sink = Arc::new(VecEventSink::new());
        let f = fixture_with(EngineConfig::default(), sink.clone());
        let scene = chain(
            &[("a", "source"), ("k", "canceller"), ("c", "fail")],
            &[("out", "in"), ("out", "in")],
        );

        let result = f
            .executor
            .execute_workflow(&scene, RunOptions::new().with_abort_signal(AbortSignal::new()))
            .await
            .unwrap();
        assert!(result.is_cancelled(), "{:?}", result.failure);
        assert_eq!(result.failure, Some(RunFailure::Cancelled { completed: 1 }));
        assert_eq!(result.failed_instance(), None);
        assert_eq!(result.status_of("a"), Some(StepStatus::Completed));
        assert_eq!(result.status_of("k"), Some(StepStatus::NotRun));
        assert_eq!(result.status_of("c"), Some(StepStatus::NotRun));

        let k = scene.instance("k").unwrap();
        assert_eq!(k.state, ExecutionState::Idle);
        assert!(k.error.is_none());

        let events = sink.events();
        assert!(matches!(events.last(), Some(WorkflowEvent::WorkflowCancelled { completed: 1, .. })));
        assert!(!events.iter().any(|e| matches!(e, WorkflowEvent::BlockFailed { .. })));
    }

    #[tokio::test]
    async fn test_downstream_refuses_cycle_when_another_cycle_is_reported_first() {
        let f = fixture();
        let scene = InMemoryScene::new();
        for (id, block_type) in [("p", "pair"), ("q", "pair"), ("b", "source"), ("c", "pair"), ("d", "pair")] {
            scene.create_instance(BlockInstance::new(id, block_type)).unwrap();
        }
        scene.add_connector(Connector::new("e1", "p", "out", "q", "in"));
        scene.add_connector(Connector::new("e2", "q", "out", "p", "loop"));
        scene.add_connector(Connector::new("e3", "b", "out", "c", "in"));
        scene.add_connector(Connector::new("e4", "c", "out", "d", "in"));
        scene.add_connector(Connector::new("e5", "d", "out", "c", "loop"));

        let whole = f.executor.validate(&scene);
        let cycles: Vec<_> = whole.errors.iter().filter(|e| e.code == IssueCode::CycleDetected).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].instance_id.as_deref(), Some("p"));

        let result = f
            .executor
            .execute_downstream(&scene, "b", RunOptions::new())
            .await
            .unwrap();
        assert!(!result.success);
        match &result.failure {
            Some(RunFailure::Validation { errors }) => {
                assert!(errors.iter().any(|e| e.code == IssueCode::CycleDetected
                    && matches!(e.instance_id.as_deref(), Some("c") | Some("d"))));
            }
            other => panic!("expected a validation failure, got {:?}", other),
        }
        assert_eq!(result.status_of("b"), Some(StepStatus::NotRun));
        assert_eq!(result.status_of("c"), Some(StepStatus::SkippedDueToCycle));
        assert_eq!(result.status_of("d"), Some(StepStatus::SkippedDueToCycle));
        assert_eq!(f.source_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_downstream_refuses_instance_behind_upstream_cycle() {
        let f = fixture();
        let scene = InMemoryScene::new();
        for (id, block_type) in [("x", "pair"), ("y", "pair"), ("z", "pair")] {
            scene.create_instance(BlockInstance::new(id, block_type)).unwrap();
        }
        scene.add_connector(Connector::new("e1", "x", "out", "y", "in"));
        scene.add_connector(Connector::new("e2", "y", "out", "x", "loop"));
        scene.add_connector(Connector::new("e3", "y", "out", "z", "in"));

        let result = f
            .executor
            .execute_downstream(&scene, "z", RunOptions::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.validation.has_code(IssueCode::CycleDetected));
        assert_eq!(result.status_of("z"), Some(StepStatus::SkippedDueToCycle));
        assert_eq!(scene.instance("z").unwrap().state, ExecutionState::Idle);
    }

    #[tokio::test]
    async fn test_graph_cache_follows_structural_edits() {
        let f = fixture();
        let executor = f.executor.with_graph_cache();
        let scene = source_double();
        assert!(executor.execute_workflow(&scene, RunOptions::new()).await.unwrap().success);

        scene.create_instance(BlockInstance::new("c", "double")).unwrap();
        scene.add_connector(Connector::new("c9", "b", "out2", "c", "in"));

        let result = executor.execute_workflow(&scene, RunOptions::new()).await.unwrap();
        assert!(result.success, "{:?}", result.failure);
        assert_eq!(result.order, vec!["a", "b", "c"]);
        assert_eq!(scene.instance("c").unwrap().outputs["out2"], json!(40));
    }

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn send(&self, _event: WorkflowEvent) -> std::result::Result<(), crate::events::EventError> {
            Err(crate::events::EventError {
                message: "sink closed".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_event_sink_errors_do_not_affect_run() {
        let f = fixture_with(EngineConfig::default(), Arc::new(BrokenSink));
        let result = f.executor.execute_workflow(&source_double(), RunOptions::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.completed, 2);
    }
}
