//! Workflow validation
//!
//! Validates connections, required inputs and graph structure. Issues are
//! collected as data, never thrown. Errors block a run; warnings never do.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::WorkflowGraph;
use crate::registry::BlockRegistry;
use crate::types::{Binding, BlockCategory, BlockInstance, InstanceId, PortId};

/// Machine-readable issue code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    UnknownBlock,
    UnknownPort,
    TypeMismatch,
    MissingRequired,
    CycleDetected,
    DuplicateInputBinding,
    ImplicitConversion,
    UnconnectedInput,
    UnusedOutput,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::UnknownBlock => "unknown_block",
            IssueCode::UnknownPort => "unknown_port",
            IssueCode::TypeMismatch => "type_mismatch",
            IssueCode::MissingRequired => "missing_required",
            IssueCode::CycleDetected => "cycle_detected",
            IssueCode::DuplicateInputBinding => "duplicate_input_binding",
            IssueCode::ImplicitConversion => "implicit_conversion",
            IssueCode::UnconnectedInput => "unconnected_input",
            IssueCode::UnusedOutput => "unused_output",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding with location context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<PortId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            instance_id: None,
            port_id: None,
            connector_id: None,
        }
    }

    pub fn on_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn on_port(mut self, port_id: impl Into<String>) -> Self {
        self.port_id = Some(port_id.into());
        self
    }

    pub fn on_connector(mut self, connector_id: impl Into<String>) -> Self {
        self.connector_id = Some(connector_id.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Aggregated outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
        self.valid = false;
    }

    pub fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Fold another result into this one
    pub fn absorb(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }

    /// Treat every warning as an error
    pub fn promote_warnings(mut self) -> Self {
        let warnings = std::mem::take(&mut self.warnings);
        self.errors.extend(warnings);
        self.valid = self.errors.is_empty();
        self
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.errors.iter().chain(&self.warnings).any(|i| i.code == code)
    }
}

/// Outcome of cycle detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub has_cycle: bool,
    /// The closed node path of the first cycle found, e.g. `[a, b, a]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_nodes: Option<Vec<InstanceId>>,
}

/// Validate one prospective connection between two block types
pub fn validate_connection(
    registry: &BlockRegistry,
    source_type: &str,
    source_port: &str,
    target_type: &str,
    target_port: &str,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    let source_def = registry.get(source_type).ok();
    let target_def = registry.get(target_type).ok();

    if source_def.is_none() {
        result.error(ValidationIssue::new(
            IssueCode::UnknownBlock,
            format!("Unknown source block type '{}'", source_type),
        ));
    }
    if target_def.is_none() {
        result.error(ValidationIssue::new(
            IssueCode::UnknownBlock,
            format!("Unknown target block type '{}'", target_type),
        ));
    }
    let (Some(source_def), Some(target_def)) = (source_def, target_def) else {
        return result;
    };

    let output = source_def.output_port(source_port);
    let input = target_def.input_port(target_port);

    if output.is_none() {
        result.error(
            ValidationIssue::new(
                IssueCode::UnknownPort,
                format!("Block type '{}' has no output port '{}'", source_type, source_port),
            )
            .on_port(source_port),
        );
    }
    if input.is_none() {
        result.error(
            ValidationIssue::new(
                IssueCode::UnknownPort,
                format!("Block type '{}' has no input port '{}'", target_type, target_port),
            )
            .on_port(target_port),
        );
    }
    let (Some(output), Some(input)) = (output, input) else {
        return result;
    };

    if !input.accepts_type(output.data_type) {
        let accepted: Vec<&str> = input.accepts.iter().map(|t| t.as_str()).collect();
        result.error(
            ValidationIssue::new(
                IssueCode::TypeMismatch,
                format!(
                    "Output '{}' produces {} but input '{}' accepts [{}]",
                    source_port,
                    output.data_type,
                    target_port,
                    accepted.join(", ")
                ),
            )
            .on_port(target_port),
        );
    } else if output.data_type != input.data_type && input.accepts_any() {
        result.warning(
            ValidationIssue::new(
                IssueCode::ImplicitConversion,
                format!(
                    "Output '{}' produces {} which is implicitly converted to {} on input '{}'",
                    source_port, output.data_type, input.data_type, target_port
                ),
            )
            .on_port(target_port),
        );
    }

    result
}

/// Find a cycle in the instance graph formed by the bindings
///
/// Depth-first search with a recursion stack. Nodes are visited in order of
/// first appearance, so the reported cycle is deterministic.
pub fn detect_cycles(bindings: &[Binding]) -> CycleReport {
    let mut nodes: Vec<&str> = Vec::new();
    let mut out_edges: HashMap<&str, Vec<&str>> = HashMap::new();

    for binding in bindings {
        for id in [binding.source_instance.as_str(), binding.target_instance.as_str()] {
            if !out_edges.contains_key(id) {
                out_edges.insert(id, Vec::new());
                nodes.push(id);
            }
        }
        if let Some(edges) = out_edges.get_mut(binding.source_instance.as_str()) {
            edges.push(&binding.target_instance);
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();

    for node in nodes {
        if !visited.contains(node) {
            if let Some(cycle) = dfs(node, &out_edges, &mut visited, &mut stack) {
                return CycleReport {
                    has_cycle: true,
                    cycle_nodes: Some(cycle),
                };
            }
        }
    }

    CycleReport::default()
}

fn dfs<'a>(
    node: &'a str,
    out_edges: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<InstanceId>> {
    visited.insert(node);
    stack.push(node);

    if let Some(nexts) = out_edges.get(node) {
        for &next in nexts {
            if let Some(pos) = stack.iter().position(|n| *n == next) {
                let mut path: Vec<InstanceId> = stack[pos..].iter().map(|s| s.to_string()).collect();
                path.push(next.to_string());
                return Some(path);
            }
            if !visited.contains(next) {
                if let Some(cycle) = dfs(next, out_edges, visited, stack) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.pop();
    None
}

/// The `cycle_detected` error for a cycle path, attached to its first instance
pub fn cycle_issue(path: &[InstanceId]) -> ValidationIssue {
    let issue = ValidationIssue::new(
        IssueCode::CycleDetected,
        format!("Cycle detected: {}", path.join(" -> ")),
    );
    match path.first() {
        Some(first) => issue.on_instance(first),
        None => issue,
    }
}

/// Check that required inputs are supplied and flag optional inputs left empty
///
/// A static value counts only when it is present and not null.
pub fn validate_required_inputs(
    registry: &BlockRegistry,
    block_type: &str,
    static_inputs: &HashMap<PortId, serde_json::Value>,
    connected_ports: &[PortId],
) -> ValidationResult {
    let mut result = ValidationResult::new();

    let Ok(definition) = registry.get(block_type) else {
        result.error(ValidationIssue::new(
            IssueCode::UnknownBlock,
            format!("Unknown block type '{}'", block_type),
        ));
        return result;
    };

    for port in &definition.inputs {
        let has_static = static_inputs.get(&port.id).is_some_and(|v| !v.is_null());
        let has_binding = connected_ports.iter().any(|p| p == &port.id);

        if port.required {
            if !has_static && !has_binding {
                result.error(
                    ValidationIssue::new(
                        IssueCode::MissingRequired,
                        format!("Required input '{}' has no value or connection", port.id),
                    )
                    .on_port(&port.id),
                );
            }
        } else if !has_static && !has_binding && port.default_value.is_none() {
            result.warning(
                ValidationIssue::new(
                    IssueCode::UnconnectedInput,
                    format!("Optional input '{}' has no value, connection or default", port.id),
                )
                .on_port(&port.id),
            );
        }
    }

    result
}

/// Validate every instance and binding of a workflow
pub fn validate_workflow(
    registry: &BlockRegistry,
    instances: &[BlockInstance],
    graph: &WorkflowGraph,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let types: HashMap<&str, &str> = instances
        .iter()
        .map(|i| (i.id.as_str(), i.block_type.as_str()))
        .collect();

    validate_instance_types(registry, instances, &mut result);
    validate_bindings(registry, &types, graph, &mut result);
    validate_duplicate_bindings(graph, &mut result);

    if let Some(path) = detect_cycles(graph.all_bindings()).cycle_nodes {
        result.error(cycle_issue(&path));
    }

    for instance in instances {
        if !registry.exists(&instance.block_type) {
            continue;
        }
        let connected = graph.connected_input_ports(&instance.id);
        let mut inputs = validate_required_inputs(
            registry,
            &instance.block_type,
            &instance.static_inputs,
            &connected,
        );
        for issue in inputs.errors.iter_mut().chain(inputs.warnings.iter_mut()) {
            issue.instance_id = Some(instance.id.clone());
        }
        result.absorb(inputs);
    }

    validate_unused_outputs(registry, instances, graph, &mut result);

    log::debug!(
        "Validated workflow: {} errors, {} warnings",
        result.errors.len(),
        result.warnings.len()
    );
    result
}

fn validate_instance_types(registry: &BlockRegistry, instances: &[BlockInstance], result: &mut ValidationResult) {
    for instance in instances {
        if !registry.exists(&instance.block_type) {
            result.error(
                ValidationIssue::new(
                    IssueCode::UnknownBlock,
                    format!(
                        "Instance '{}' has unknown block type '{}'",
                        instance.id, instance.block_type
                    ),
                )
                .on_instance(&instance.id),
            );
        }
    }
}

fn validate_bindings(
    registry: &BlockRegistry,
    types: &HashMap<&str, &str>,
    graph: &WorkflowGraph,
    result: &mut ValidationResult,
) {
    for binding in graph.all_bindings() {
        let (Some(source_type), Some(target_type)) = (
            types.get(binding.source_instance.as_str()),
            types.get(binding.target_instance.as_str()),
        ) else {
            continue;
        };

        let mut check = validate_connection(
            registry,
            source_type,
            &binding.source_port,
            target_type,
            &binding.target_port,
        );
        for issue in check.errors.iter_mut().chain(check.warnings.iter_mut()) {
            issue.instance_id = Some(binding.target_instance.clone());
            issue.connector_id = Some(binding.connector_id.clone());
        }
        result.absorb(check);
    }
}

fn validate_duplicate_bindings(graph: &WorkflowGraph, result: &mut ValidationResult) {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for binding in graph.all_bindings() {
        let key = (binding.target_instance.as_str(), binding.target_port.as_str());
        if !seen.insert(key) {
            result.error(
                ValidationIssue::new(
                    IssueCode::DuplicateInputBinding,
                    format!(
                        "Input '{}' on '{}' already has a connection",
                        binding.target_port, binding.target_instance
                    ),
                )
                .on_instance(&binding.target_instance)
                .on_port(&binding.target_port)
                .on_connector(&binding.connector_id),
            );
        }
    }
}

fn validate_unused_outputs(
    registry: &BlockRegistry,
    instances: &[BlockInstance],
    graph: &WorkflowGraph,
    result: &mut ValidationResult,
) {
    for instance in instances {
        let Ok(definition) = registry.get(&instance.block_type) else {
            continue;
        };
        if definition.category == BlockCategory::Output {
            continue;
        }
        let connected = graph.connected_output_ports(&instance.id);
        for port in &definition.outputs {
            if !connected.contains(&port.id) {
                result.warning(
                    ValidationIssue::new(
                        IssueCode::UnusedOutput,
                        format!("Output '{}' is not connected", port.id),
                    )
                    .on_instance(&instance.id)
                    .on_port(&port.id),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{InMemoryScene, Scene};
    use crate::types::{BlockDefinition, Connector, InputPort, OutputPort, PortDataType};

    fn make_registry() -> BlockRegistry {
        let mut registry = BlockRegistry::new();
        registry.register(
            BlockDefinition::new("text-source", BlockCategory::Trigger, "Text")
                .output(OutputPort::new("out", "Out", PortDataType::Text)),
        );
        registry.register(
            BlockDefinition::new("number-sink", BlockCategory::Output, "Number")
                .input(InputPort::required("in", "In", PortDataType::Number)),
        );
        registry.register(
            BlockDefinition::new("any-sink", BlockCategory::Output, "Any")
                .input(InputPort::optional("in", "In", PortDataType::Any).accepting([PortDataType::Any])),
        );
        registry.register(
            BlockDefinition::new("pass", BlockCategory::Transformer, "Pass")
                .input(InputPort::optional("in", "In", PortDataType::Any).accepting([PortDataType::Any]))
                .input(InputPort::optional("opt", "Opt", PortDataType::Text).with_default(serde_json::json!("")))
                .output(OutputPort::new("out", "Out", PortDataType::Any)),
        );
        registry
    }

    fn binding(id: &str, from: &str, to: &str) -> Binding {
        Binding {
            connector_id: id.into(),
            source_instance: from.into(),
            source_port: "out".into(),
            target_instance: to.into(),
            target_port: "in".into(),
        }
    }

    #[test]
    fn test_text_into_number_is_type_mismatch() {
        let result = validate_connection(&make_registry(), "text-source", "out", "number-sink", "in");
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, IssueCode::TypeMismatch);
    }

    #[test]
    fn test_text_into_any_warns_implicit_conversion() {
        let result = validate_connection(&make_registry(), "text-source", "out", "any-sink", "in");
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings[0].code, IssueCode::ImplicitConversion);
    }

    #[test]
    fn test_any_source_flows_anywhere_without_warning() {
        let result = validate_connection(&make_registry(), "pass", "out", "number-sink", "in");
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_block_and_port() {
        let registry = make_registry();
        let result = validate_connection(&registry, "nope", "out", "number-sink", "in");
        assert_eq!(result.errors[0].code, IssueCode::UnknownBlock);

        let result = validate_connection(&registry, "text-source", "missing", "number-sink", "wrong");
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.code == IssueCode::UnknownPort));
    }

    #[test]
    fn test_detect_two_node_cycle() {
        let report = detect_cycles(&[binding("e1", "a", "b"), binding("e2", "b", "a")]);
        assert!(report.has_cycle);
        assert_eq!(report.cycle_nodes, Some(vec!["a".into(), "b".into(), "a".into()]));
    }

    #[test]
    fn test_detect_no_cycle() {
        let report = detect_cycles(&[
            binding("e1", "a", "b"),
            binding("e2", "a", "c"),
            binding("e3", "b", "d"),
            binding("e4", "c", "d"),
        ]);
        assert_eq!(report, CycleReport::default());
        assert!(detect_cycles(&[]).cycle_nodes.is_none());
    }

    #[test]
    fn test_detect_self_loop_and_tail_cycle() {
        let report = detect_cycles(&[binding("e1", "a", "a")]);
        assert_eq!(report.cycle_nodes, Some(vec!["a".into(), "a".into()]));

        let report = detect_cycles(&[
            binding("e1", "x", "y"),
            binding("e2", "y", "z"),
            binding("e3", "z", "y"),
        ]);
        assert_eq!(report.cycle_nodes, Some(vec!["y".into(), "z".into(), "y".into()]));
    }

    #[test]
    fn test_missing_required_input() {
        let registry = make_registry();
        let result = validate_required_inputs(&registry, "number-sink", &HashMap::new(), &[]);
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, IssueCode::MissingRequired);
        assert_eq!(result.errors[0].port_id.as_deref(), Some("in"));

        let mut statics = HashMap::new();
        statics.insert("in".to_string(), serde_json::json!(3));
        assert!(validate_required_inputs(&registry, "number-sink", &statics, &[]).valid);
        assert!(validate_required_inputs(&registry, "number-sink", &HashMap::new(), &["in".to_string()]).valid);

        statics.insert("in".to_string(), serde_json::Value::Null);
        assert!(!validate_required_inputs(&registry, "number-sink", &statics, &[]).valid);
    }

    #[test]
    fn test_optional_input_warnings_respect_defaults() {
        let result = validate_required_inputs(&make_registry(), "pass", &HashMap::new(), &[]);
        assert!(result.valid);
        let ports: Vec<&str> = result.warnings.iter().filter_map(|w| w.port_id.as_deref()).collect();
        assert_eq!(ports, vec!["in"]);
    }

    fn validate_scene(scene: &InMemoryScene, registry: &BlockRegistry) -> ValidationResult {
        let graph = WorkflowGraph::from_scene(scene, registry);
        validate_workflow(registry, &scene.instances(), &graph)
    }

    #[test]
    fn test_workflow_aggregates_issues() {
        let registry = make_registry();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("t", "text-source")).unwrap();
        scene.create_instance(BlockInstance::new("n", "number-sink")).unwrap();
        scene.create_instance(BlockInstance::new("lost", "ghost")).unwrap();
        scene.add_connector(Connector::new("c1", "t", "out", "n", "in"));

        let result = validate_scene(&scene, &registry);
        assert!(!result.valid);
        let mismatch = result.errors.iter().find(|e| e.code == IssueCode::TypeMismatch).unwrap();
        assert_eq!(mismatch.connector_id.as_deref(), Some("c1"));
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == IssueCode::UnknownBlock && e.instance_id.as_deref() == Some("lost")));
        // The binding satisfies the required input even though its type is wrong
        assert!(!result.has_code(IssueCode::MissingRequired));
    }

    #[test]
    fn test_workflow_cycle_and_unused_outputs() {
        let registry = make_registry();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("a", "pass")).unwrap();
        scene.create_instance(BlockInstance::new("b", "pass")).unwrap();
        scene.create_instance(BlockInstance::new("sink", "any-sink")).unwrap();
        scene.add_connector(Connector::new("c1", "a", "out", "b", "in"));
        scene.add_connector(Connector::new("c2", "b", "out", "a", "in"));

        let result = validate_scene(&scene, &registry);
        let cycle = result.errors.iter().find(|e| e.code == IssueCode::CycleDetected).unwrap();
        assert_eq!(cycle.instance_id.as_deref(), Some("a"));
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.code == IssueCode::UnusedOutput && w.instance_id.as_deref() == Some("sink")));
    }

    #[test]
    fn test_workflow_unused_output_and_warning_promotion() {
        let registry = make_registry();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("t", "text-source")).unwrap();

        let result = validate_scene(&scene, &registry);
        assert!(result.valid);
        assert_eq!(result.warnings[0].code, IssueCode::UnusedOutput);

        let strict = result.promote_warnings();
        assert!(!strict.valid);
        assert!(strict.warnings.is_empty());
    }

    #[test]
    fn test_workflow_rejects_second_binding_on_input() {
        let registry = make_registry();
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("t1", "text-source")).unwrap();
        scene.create_instance(BlockInstance::new("t2", "text-source")).unwrap();
        scene.create_instance(BlockInstance::new("sink", "any-sink")).unwrap();
        scene.add_connector(Connector::new("c1", "t1", "out", "sink", "in"));
        scene.add_connector(Connector::new("c2", "t2", "out", "sink", "in"));

        let result = validate_scene(&scene, &registry);
        let dupes: Vec<&ValidationIssue> = result
            .errors
            .iter()
            .filter(|e| e.code == IssueCode::DuplicateInputBinding)
            .collect();
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].connector_id.as_deref(), Some("c2"));
    }

    #[test]
    fn test_issue_serialization() {
        let issue = ValidationIssue::new(IssueCode::MissingRequired, "x").on_port("in");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "missing_required");
        assert_eq!(json["portId"], "in");
        assert!(json.get("instanceId").is_none());
    }
}
