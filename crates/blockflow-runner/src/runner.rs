//! Scene loading and the command implementations

use std::path::Path;
use std::sync::Arc;

use block_engine::{
    extension_keys, state_summary, AbortSignal, BlockCategory, BlockDefinition, BlockRegistry, ExecutorExtensions, InMemoryScene,
    LogEventSink, RunOptions, Scene, SceneSnapshot, ValidationResult, WorkflowExecutor, WorkflowRunResult,
};
use workflow_blocks::{builtin_registry, setup_extensions};

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};

/// Which part of a scene a run covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunScope {
    #[default]
    All,
    StartAt(String),
    Downstream(String),
}

pub async fn load_scene(path: &Path) -> Result<Arc<InMemoryScene>> {
    let display = path.display().to_string();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RunnerError::ReadScene {
            path: display.clone(),
            source,
        })?;
    let snapshot: SceneSnapshot =
        serde_json::from_str(&contents).map_err(|source| RunnerError::ParseScene { path: display, source })?;

    log::info!(
        "Loaded scene {:?}: {} instances, {} connectors",
        path,
        snapshot.instances.len(),
        snapshot.connectors.len()
    );
    Ok(Arc::new(InMemoryScene::from_snapshot(snapshot)))
}

pub async fn save_scene(scene: &InMemoryScene, path: &Path) -> Result<()> {
    let contents = serde_json::to_string_pretty(&scene.snapshot())?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| RunnerError::WriteScene {
            path: path.display().to_string(),
            source,
        })?;
    log::info!("Scene written to {:?}", path);
    Ok(())
}

fn parse_category(name: &str) -> Result<BlockCategory> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase()))
        .map_err(|_| RunnerError::UnknownCategory(name.to_string()))
}

/// Registry and configuration shared by every command
pub struct Runner {
    config: RunnerConfig,
    registry: Arc<BlockRegistry>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        let registry = Arc::new(builtin_registry(&config.blocks));
        Self { config, registry }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    fn executor(&self, scene: &Arc<InMemoryScene>) -> Result<WorkflowExecutor> {
        let mut extensions = ExecutorExtensions::new();
        setup_extensions(&mut extensions, &self.config.blocks)?;
        let handle: Arc<dyn Scene> = scene.clone();
        extensions.set(extension_keys::SCENE, handle);

        Ok(WorkflowExecutor::new(self.registry.clone())
            .with_extensions(extensions)
            .with_event_sink(Arc::new(LogEventSink))
            .with_config(self.config.engine.clone())
            .with_graph_cache())
    }

    pub async fn run(
        &self,
        scene: &Arc<InMemoryScene>,
        scope: RunScope,
        abort: AbortSignal,
    ) -> Result<WorkflowRunResult> {
        let executor = self.executor(scene)?;
        let options = RunOptions::new()
            .with_abort_signal(abort)
            .on_progress(|completed, total| log::info!("Progress: {}/{}", completed, total));

        let result = match scope {
            RunScope::All => executor.execute_workflow(scene.as_ref(), options).await?,
            RunScope::StartAt(id) => {
                executor
                    .execute_workflow(scene.as_ref(), options.starting_at(id))
                    .await?
            }
            RunScope::Downstream(id) => executor.execute_downstream(scene.as_ref(), &id, options).await?,
        };

        let mut states: Vec<String> = state_summary(scene.as_ref())
            .into_iter()
            .map(|(state, count)| format!("{:?}={}", state, count))
            .collect();
        states.sort();
        log::info!("Instance states after run {}: {}", result.run_id, states.join(", "));
        Ok(result)
    }

    pub fn validate(&self, scene: &Arc<InMemoryScene>) -> Result<ValidationResult> {
        Ok(self.executor(scene)?.validate(scene.as_ref()))
    }

    pub fn reset(&self, scene: &Arc<InMemoryScene>) -> Result<usize> {
        Ok(self.executor(scene)?.reset_workflow(scene.as_ref())?)
    }

    pub fn catalog(&self, category: Option<&str>) -> Result<Vec<&BlockDefinition>> {
        match category {
            Some(name) => Ok(self.registry.by_category(parse_category(name)?)),
            None => Ok(self.registry.all_definitions()),
        }
    }
}
