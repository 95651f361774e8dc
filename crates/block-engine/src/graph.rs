//! Graph and binding accessors
//!
//! Reconstructs the directed dataflow graph from the scene's instances and
//! connectors. Nodes are block instances, edges are [`Binding`]s: connectors
//! whose endpoints both resolve to existing instances and to ports that
//! exist on those instances' definitions. Anything else is left out of the
//! graph silently, since half-drawn connectors are normal while editing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::registry::BlockRegistry;
use crate::scene::Scene;
use crate::types::{Binding, BlockInstance, Connector, InstanceId, PortId};

/// A node of the graph: an instance id and its block type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: InstanceId,
    pub block_type: String,
}

/// Topological run order computed with Kahn's algorithm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Instances in dependency order
    pub order: Vec<InstanceId>,
    /// Instances that could not be placed because they sit on or behind a cycle
    pub cyclic: Vec<InstanceId>,
}

impl ExecutionPlan {
    pub fn is_acyclic(&self) -> bool {
        self.cyclic.is_empty()
    }

    /// Position of an instance within the order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|i| i == id)
    }
}

/// The derived structure {instances, bindings}
///
/// Holds topology only. Instance values (configuration, outputs, state) are
/// always read from the scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    pub nodes: Vec<GraphNode>,
    pub bindings: Vec<Binding>,
}

impl WorkflowGraph {
    /// Build the graph from instances and connectors
    pub fn build(instances: &[BlockInstance], connectors: &[Connector], registry: &BlockRegistry) -> Self {
        let nodes: Vec<GraphNode> = instances
            .iter()
            .map(|i| GraphNode {
                id: i.id.clone(),
                block_type: i.block_type.clone(),
            })
            .collect();

        let types: HashMap<&str, &str> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.block_type.as_str()))
            .collect();

        let bindings = connectors
            .iter()
            .filter_map(|c| resolve_binding(c, &types, registry))
            .collect();

        Self { nodes, bindings }
    }

    /// Build the graph from the scene's current state
    pub fn from_scene(scene: &dyn Scene, registry: &BlockRegistry) -> Self {
        Self::build(&scene.instances(), &scene.connectors(), registry)
    }

    /// Every structurally valid binding, in connector order
    pub fn all_bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Bindings that end at an instance
    pub fn input_bindings(&self, id: &str) -> Vec<&Binding> {
        self.bindings.iter().filter(|b| b.target_instance == id).collect()
    }

    /// Bindings that start at an instance
    pub fn output_bindings(&self, id: &str) -> Vec<&Binding> {
        self.bindings.iter().filter(|b| b.source_instance == id).collect()
    }

    /// The first binding feeding one input port
    pub fn input_binding_for(&self, id: &str, port_id: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.target_instance == id && b.target_port == port_id)
    }

    /// Distinct input ports with at least one binding
    pub fn connected_input_ports(&self, id: &str) -> Vec<PortId> {
        distinct(self.input_bindings(id).into_iter().map(|b| b.target_port.clone()))
    }

    /// Distinct output ports with at least one binding
    pub fn connected_output_ports(&self, id: &str) -> Vec<PortId> {
        distinct(self.output_bindings(id).into_iter().map(|b| b.source_port.clone()))
    }

    /// Directly connected upstream instance ids
    pub fn upstream(&self, id: &str) -> Vec<InstanceId> {
        distinct(self.input_bindings(id).into_iter().map(|b| b.source_instance.clone()))
    }

    /// Directly connected downstream instance ids
    pub fn downstream(&self, id: &str) -> Vec<InstanceId> {
        distinct(self.output_bindings(id).into_iter().map(|b| b.target_instance.clone()))
    }

    /// An instance and everything transitively downstream of it
    pub fn downstream_closure(&self, id: &str) -> HashSet<InstanceId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(id.to_string());
        queue.push_back(id.to_string());

        while let Some(current) = queue.pop_front() {
            for next in self.downstream(&current) {
                if seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }

        seen
    }

    /// Compute the run order using Kahn's algorithm
    ///
    /// Ready instances are taken in scene order, so the result is
    /// deterministic for a given scene.
    pub fn execution_order(&self) -> ExecutionPlan {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in &self.nodes {
            in_degree.insert(&node.id, 0);
            adjacency.insert(&node.id, Vec::new());
        }

        for binding in &self.bindings {
            if let Some(adj) = adjacency.get_mut(binding.source_instance.as_str()) {
                adj.push(&binding.target_instance);
            }
            if let Some(degree) = in_degree.get_mut(binding.target_instance.as_str()) {
                *degree += 1;
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());

            if let Some(neighbors) = adjacency.get(node) {
                for &neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(neighbor);
                        }
                    }
                }
            }
        }

        let placed: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
        let cyclic = self
            .nodes
            .iter()
            .filter(|n| !placed.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        ExecutionPlan { order, cyclic }
    }
}

/// Resolve a connector into a binding, or `None` if either end is unresolved
fn resolve_binding(
    connector: &Connector,
    types: &HashMap<&str, &str>,
    registry: &BlockRegistry,
) -> Option<Binding> {
    let source = connector.source.as_ref()?;
    let target = connector.target.as_ref()?;

    let source_def = registry.get(types.get(source.instance_id.as_str())?).ok()?;
    let target_def = registry.get(types.get(target.instance_id.as_str())?).ok()?;

    source_def.output_port(&source.port_id)?;
    target_def.input_port(&target.port_id)?;

    Some(Binding {
        connector_id: connector.id.clone(),
        source_instance: source.instance_id.clone(),
        source_port: source.port_id.clone(),
        target_instance: target.instance_id.clone(),
        target_port: target.port_id.clone(),
    })
}

fn distinct(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

/// Memoised graph keyed on the scene revision
///
/// Rebuilding is skipped while the revision is unchanged. One cache serves
/// one scene.
#[derive(Default)]
pub struct GraphCache {
    cached: Mutex<Option<(u64, Arc<WorkflowGraph>)>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the graph for the scene's current revision
    pub fn graph(&self, scene: &dyn Scene, registry: &BlockRegistry) -> Arc<WorkflowGraph> {
        let revision = scene.revision();
        let mut cached = self.cached.lock();
        if let Some((rev, graph)) = cached.as_ref() {
            if *rev == revision {
                return graph.clone();
            }
        }

        log::debug!("Rebuilding workflow graph at scene revision {}", revision);
        let graph = Arc::new(WorkflowGraph::from_scene(scene, registry));
        *cached = Some((revision, graph.clone()));
        graph
    }

    /// Drop the cached graph
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}
