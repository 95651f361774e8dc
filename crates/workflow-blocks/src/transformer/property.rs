//! Property Block
//!
//! Extracts a value from an object or array using a path expression.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::ports::{config_str, outputs, require};
use crate::BlockDescriptor;

/// One step of a property path
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Split a path like `data.items[0].name` or `headers["content-type"]`
///
/// Returns `None` for a malformed path (unclosed bracket, non-numeric
/// unquoted index).
fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => inner.push(c),
                        None => return None,
                    }
                }
                let inner = inner.trim();
                let quoted = inner.len() >= 2
                    && ((inner.starts_with('"') && inner.ends_with('"'))
                        || (inner.starts_with('\'') && inner.ends_with('\'')));
                if quoted {
                    segments.push(Segment::Key(inner[1..inner.len() - 1].to_string()));
                } else {
                    segments.push(Segment::Index(inner.parse().ok()?));
                }
            }
            c => key.push(c),
        }
    }
    if !key.is_empty() {
        segments.push(Segment::Key(key));
    }
    Some(segments)
}

/// Resolve a path against a value; an empty path yields the value itself
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    parse_path(path)?
        .iter()
        .try_fold(value, |current, segment| match segment {
            Segment::Key(key) => match current {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            },
            Segment::Index(index) => current.get(*index),
        })
}

/// Property Block
///
/// # Configuration
/// - `path` - Dot/bracket path, e.g. `data.items[0].name`
/// - `default` - Value output when the path is not found (default: null)
///
/// # Outputs
/// - `value` - Extracted value or the default
/// - `found` - Whether the path resolved
pub struct PropertyBlock;

impl PropertyBlock {
    pub const PORT_OBJECT: &'static str = "object";
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_FOUND: &'static str = "found";
}

impl BlockDescriptor for PropertyBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("property", BlockCategory::Transformer, "Property")
            .with_description("Extracts a value by path")
            .input(
                InputPort::required(Self::PORT_OBJECT, "Object", PortDataType::Object)
                    .accepting([PortDataType::Object, PortDataType::Array]),
            )
            .output(OutputPort::new(Self::PORT_VALUE, "Value", PortDataType::Any))
            .output(OutputPort::new(Self::PORT_FOUND, "Found", PortDataType::Boolean))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "default": {}
                }
            }))
            .with_default_config(json!({ "path": "" }))
    }
}

#[async_trait]
impl BlockExecutor for PropertyBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let object = require(&inputs, Self::PORT_OBJECT)?;
        let path = config_str(config, "path").unwrap_or_default();

        let (value, found) = match extract_path(object, path) {
            Some(value) => (value.clone(), true),
            None => (config.get("default").cloned().unwrap_or(Value::Null), false),
        };
        log::debug!("PropertyBlock {}: path '{}' found={}", ctx.instance_id, path, found);

        Ok(outputs([(Self::PORT_VALUE, value), (Self::PORT_FOUND, json!(found))]))
    }
}
