//! Markdown Block
//!
//! Formats a value as markdown and can materialise the result as a note.

use std::sync::Arc;

use async_trait::async_trait;
use block_engine::{
    extension_keys, BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockInstance, BlockOutputs,
    ExecutionContext, InputPort, OutputPort, PortDataType, Result, Scene,
};
use serde_json::{json, Value};

use super::note::NoteBlock;
use crate::ports::{as_text, config_bool, config_str, outputs};
use crate::BlockDescriptor;

/// Render a value as markdown
///
/// Strings are taken as markdown already. Arrays become bullet lists and
/// objects become `**key**: value` lists; anything nested deeper is shown
/// as inline JSON.
pub fn to_markdown(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| format!("- **{}**: {}", key, inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => format!("`{}`", value),
        other => as_text(other),
    }
}

/// Markdown Block
///
/// # Configuration
/// - `title` - Prepended as a level-one heading
/// - `createNote` - Also create a `note` instance holding the markdown
///   (requires the scene under `extension_keys::SCENE`)
///
/// # Outputs
/// - `markdown` - Rendered markdown
/// - `noteId` - Id of the created note, or null
pub struct MarkdownBlock;

impl MarkdownBlock {
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_MARKDOWN: &'static str = "markdown";
    pub const PORT_NOTE_ID: &'static str = "noteId";

    fn create_note(scene: &dyn Scene, markdown: &str) -> Result<String> {
        let id = format!("{}-{}", NoteBlock::BLOCK_TYPE, uuid::Uuid::new_v4());
        let note = BlockInstance::from_definition(id, &NoteBlock::definition())
            .with_config(json!({ "content": markdown }));
        scene.create_instance(note)
    }
}

impl BlockDescriptor for MarkdownBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("markdown", BlockCategory::Output, "Markdown")
            .with_description("Formats a value as markdown")
            .input(
                InputPort::optional(Self::PORT_VALUE, "Value", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_MARKDOWN, "Markdown", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_NOTE_ID, "Note", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "createNote": { "type": "boolean" }
                }
            }))
            .with_default_config(json!({ "createNote": false }))
    }
}

#[async_trait]
impl BlockExecutor for MarkdownBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let value = inputs.get(Self::PORT_VALUE).cloned().unwrap_or(Value::Null);
        let body = to_markdown(&value);
        let markdown = match config_str(config, "title").filter(|t| !t.is_empty()) {
            Some(title) => format!("# {}\n\n{}", title, body),
            None => body,
        };

        let mut note_id = Value::Null;
        if config_bool(config, "createNote").unwrap_or(false) {
            match ctx.extensions.get::<Arc<dyn Scene>>(extension_keys::SCENE) {
                Some(scene) => {
                    let id = Self::create_note(scene.as_ref(), &markdown)?;
                    log::info!("MarkdownBlock {}: created note {}", ctx.instance_id, id);
                    note_id = json!(id);
                }
                None => log::warn!(
                    "MarkdownBlock {}: createNote is set but no scene is available",
                    ctx.instance_id
                ),
            }
        }

        Ok(outputs([(Self::PORT_MARKDOWN, json!(markdown)), (Self::PORT_NOTE_ID, note_id)]))
    }
}
