//! The external scene the engine reads from and writes back to
//!
//! The scene owns block instances and connectors. The engine never keeps
//! its own copy of the graph; it enumerates the scene on every query and
//! reports execution results through the mutation hooks.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{BlockEngineError, Result};
use crate::types::{BlockInstance, BlockOutputs, Connector, ExecutionState, InstanceId};

/// Source of truth for instances and connectors
///
/// Implementations use interior mutability; the engine only holds shared
/// references while a run is awaiting a block.
pub trait Scene: Send + Sync {
    /// Current block instances, in scene order
    fn instances(&self) -> Vec<BlockInstance>;

    /// Current connectors, in scene order
    fn connectors(&self) -> Vec<Connector>;

    /// Look up a single instance
    fn instance(&self, id: &str) -> Option<BlockInstance> {
        self.instances().into_iter().find(|i| i.id == id)
    }

    /// Counter bumped whenever instances or connectors are added or removed
    fn revision(&self) -> u64;

    fn set_config(&self, id: &str, config: serde_json::Value) -> Result<()>;

    fn set_static_input(&self, id: &str, port_id: &str, value: serde_json::Value) -> Result<()>;

    fn set_outputs(&self, id: &str, outputs: BlockOutputs) -> Result<()>;

    fn set_execution_state(&self, id: &str, state: ExecutionState) -> Result<()>;

    fn set_error(&self, id: &str, error: Option<String>) -> Result<()>;

    /// Add a new instance, returning its id
    fn create_instance(&self, instance: BlockInstance) -> Result<InstanceId>;

    /// Remove an instance and every connector attached to it
    fn delete_instance(&self, id: &str) -> Result<()>;
}

/// Serializable contents of a scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSnapshot {
    #[serde(default)]
    pub instances: Vec<BlockInstance>,
    #[serde(default)]
    pub connectors: Vec<Connector>,
}

#[derive(Debug, Default)]
struct SceneState {
    instances: Vec<BlockInstance>,
    connectors: Vec<Connector>,
    revision: u64,
}

/// A scene held entirely in memory
///
/// Used by command-line hosts and tests.
#[derive(Debug, Default)]
pub struct InMemoryScene {
    state: RwLock<SceneState>,
}

impl InMemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SceneSnapshot) -> Self {
        Self {
            state: RwLock::new(SceneState {
                instances: snapshot.instances,
                connectors: snapshot.connectors,
                revision: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let state = self.state.read();
        SceneSnapshot {
            instances: state.instances.clone(),
            connectors: state.connectors.clone(),
        }
    }

    /// Add a connector
    pub fn add_connector(&self, connector: Connector) {
        let mut state = self.state.write();
        state.connectors.push(connector);
        state.revision += 1;
    }

    /// Remove a connector by id, returning whether it existed
    pub fn remove_connector(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.connectors.len();
        state.connectors.retain(|c| c.id != id);
        let removed = state.connectors.len() != before;
        if removed {
            state.revision += 1;
        }
        removed
    }

    fn with_instance<T>(&self, id: &str, f: impl FnOnce(&mut BlockInstance) -> T) -> Result<T> {
        let mut state = self.state.write();
        state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .map(f)
            .ok_or_else(|| BlockEngineError::InstanceNotFound(id.to_string()))
    }
}

impl Scene for InMemoryScene {
    fn instances(&self) -> Vec<BlockInstance> {
        self.state.read().instances.clone()
    }

    fn connectors(&self) -> Vec<Connector> {
        self.state.read().connectors.clone()
    }

    fn instance(&self, id: &str) -> Option<BlockInstance> {
        self.state.read().instances.iter().find(|i| i.id == id).cloned()
    }

    fn revision(&self) -> u64 {
        self.state.read().revision
    }

    fn set_config(&self, id: &str, config: serde_json::Value) -> Result<()> {
        self.with_instance(id, |i| i.config = config)
    }

    fn set_static_input(&self, id: &str, port_id: &str, value: serde_json::Value) -> Result<()> {
        self.with_instance(id, |i| {
            i.static_inputs.insert(port_id.to_string(), value);
        })
    }

    fn set_outputs(&self, id: &str, outputs: BlockOutputs) -> Result<()> {
        self.with_instance(id, |i| i.outputs = outputs)
    }

    fn set_execution_state(&self, id: &str, state: ExecutionState) -> Result<()> {
        self.with_instance(id, |i| i.state = state)
    }

    fn set_error(&self, id: &str, error: Option<String>) -> Result<()> {
        self.with_instance(id, |i| i.error = error)
    }

    fn create_instance(&self, instance: BlockInstance) -> Result<InstanceId> {
        let mut state = self.state.write();
        if state.instances.iter().any(|i| i.id == instance.id) {
            return Err(BlockEngineError::Scene(format!(
                "Instance '{}' already exists",
                instance.id
            )));
        }
        let id = instance.id.clone();
        state.instances.push(instance);
        state.revision += 1;
        Ok(id)
    }

    fn delete_instance(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        let before = state.instances.len();
        state.instances.retain(|i| i.id != id);
        if state.instances.len() == before {
            return Err(BlockEngineError::InstanceNotFound(id.to_string()));
        }
        state.connectors.retain(|c| {
            let touches = |end: &Option<crate::types::ConnectorEndpoint>| {
                end.as_ref().map(|e| e.instance_id == id).unwrap_or(false)
            };
            !touches(&c.source) && !touches(&c.target)
        });
        state.revision += 1;
        Ok(())
    }
}

/// Count instances per execution state
pub fn state_summary(scene: &dyn Scene) -> HashMap<ExecutionState, usize> {
    let mut summary = HashMap::new();
    for instance in scene.instances() {
        *summary.entry(instance.state).or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_scene() -> InMemoryScene {
        let scene = InMemoryScene::new();
        scene.create_instance(BlockInstance::new("a", "source")).unwrap();
        scene.create_instance(BlockInstance::new("b", "sink")).unwrap();
        scene.add_connector(Connector::new("c1", "a", "out", "b", "in"));
        scene
    }

    #[test]
    fn test_mutation_hooks() {
        let scene = two_block_scene();
        scene.set_config("a", serde_json::json!({"k": 1})).unwrap();
        scene.set_static_input("b", "in", serde_json::json!(5)).unwrap();
        scene.set_execution_state("b", ExecutionState::Success).unwrap();
        scene.set_error("b", Some("bad".into())).unwrap();

        let a = scene.instance("a").unwrap();
        assert_eq!(a.config["k"], 1);
        let b = scene.instance("b").unwrap();
        assert_eq!(b.static_inputs["in"], 5);
        assert_eq!(b.state, ExecutionState::Success);
        assert_eq!(b.error.as_deref(), Some("bad"));

        assert!(matches!(
            scene.set_outputs("zzz", BlockOutputs::new()),
            Err(BlockEngineError::InstanceNotFound(_))
        ));
    }

    #[test]
    fn test_revision_tracks_structure_only() {
        let scene = two_block_scene();
        let rev = scene.revision();
        scene.set_execution_state("a", ExecutionState::Running).unwrap();
        assert_eq!(scene.revision(), rev);

        scene.add_connector(Connector::dangling("c2", "a", "out"));
        assert_eq!(scene.revision(), rev + 1);
        assert!(scene.remove_connector("c2"));
        assert!(!scene.remove_connector("c2"));
        assert_eq!(scene.revision(), rev + 2);
    }

    #[test]
    fn test_delete_instance_drops_connectors() {
        let scene = two_block_scene();
        scene.delete_instance("a").unwrap();
        assert_eq!(scene.instances().len(), 1);
        assert!(scene.connectors().is_empty());
        assert!(scene.delete_instance("a").is_err());
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let scene = two_block_scene();
        assert!(scene.create_instance(BlockInstance::new("a", "source")).is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let scene = two_block_scene();
        let json = serde_json::to_string(&scene.snapshot()).unwrap();
        let restored = InMemoryScene::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.snapshot(), scene.snapshot());
    }

    #[test]
    fn test_state_summary() {
        let scene = two_block_scene();
        scene.set_execution_state("a", ExecutionState::Success).unwrap();
        let summary = state_summary(&scene);
        assert_eq!(summary[&ExecutionState::Success], 1);
        assert_eq!(summary[&ExecutionState::Idle], 1);
    }
}
