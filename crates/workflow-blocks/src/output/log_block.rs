//! Log Block
//!
//! Writes its input to the application log and passes it through.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, InputPort,
    OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::ports::{as_text, config_str, outputs};
use crate::BlockDescriptor;

/// Log Block
///
/// # Configuration
/// - `level` - error, warn, info (default) or debug
/// - `label` - Prefix for the log line (default: the instance id)
pub struct LogBlock;

impl LogBlock {
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_LOGGED: &'static str = "logged";

    fn level(config: &Value) -> log::Level {
        match config_str(config, "level") {
            Some("error") => log::Level::Error,
            Some("warn") => log::Level::Warn,
            Some("debug") => log::Level::Debug,
            Some("trace") => log::Level::Trace,
            _ => log::Level::Info,
        }
    }
}

impl BlockDescriptor for LogBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("log", BlockCategory::Output, "Log")
            .with_description("Writes a value to the log")
            .input(
                InputPort::optional(Self::PORT_VALUE, "Value", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_LOGGED, "Logged", PortDataType::Any))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "level": { "type": "string", "enum": ["error", "warn", "info", "debug", "trace"] },
                    "label": { "type": "string" }
                }
            }))
            .with_default_config(json!({ "level": "info" }))
    }
}

#[async_trait]
impl BlockExecutor for LogBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let value = inputs.get(Self::PORT_VALUE).cloned().unwrap_or(Value::Null);
        let label = config_str(config, "label").unwrap_or(ctx.instance_id);
        log::log!(Self::level(config), "[{}] {}", label, as_text(&value));

        Ok(outputs([(Self::PORT_LOGGED, value)]))
    }
}
