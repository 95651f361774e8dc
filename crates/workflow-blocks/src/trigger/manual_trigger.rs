//! Manual Trigger Block
//!
//! Starts a workflow when the user presses run, emitting a configured payload.

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext, OutputPort,
    PortDataType, Result,
};
use serde_json::json;

use crate::ports::outputs;
use crate::BlockDescriptor;

/// Manual Trigger Block
///
/// # Configuration
/// - `payload` - Value emitted when the workflow runs (default: null)
///
/// # Outputs
/// - `payload` - The configured payload
/// - `triggeredAt` - RFC 3339 timestamp of the execution
pub struct ManualTriggerBlock;

impl ManualTriggerBlock {
    pub const PORT_PAYLOAD: &'static str = "payload";
    pub const PORT_TRIGGERED_AT: &'static str = "triggeredAt";
}

impl BlockDescriptor for ManualTriggerBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("manual-trigger", BlockCategory::Trigger, "Manual Trigger")
            .with_description("Starts the workflow with a configured payload")
            .output(OutputPort::new(Self::PORT_PAYLOAD, "Payload", PortDataType::Any))
            .output(OutputPort::new(Self::PORT_TRIGGERED_AT, "Triggered At", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": { "payload": {} }
            }))
            .with_default_config(json!({ "payload": null }))
    }
}

#[async_trait]
impl BlockExecutor for ManualTriggerBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        _inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let payload = config.get("payload").cloned().unwrap_or(serde_json::Value::Null);
        log::debug!("ManualTriggerBlock {}: firing", ctx.instance_id);

        Ok(outputs([
            (Self::PORT_PAYLOAD, payload),
            (Self::PORT_TRIGGERED_AT, json!(ctx.timestamp.to_rfc3339())),
        ]))
    }
}
