//! Delay Block
//!
//! Waits for a configured time, then passes its input through.

use std::time::Duration;

use async_trait::async_trait;
use block_engine::{
    BlockCategory, BlockDefinition, BlockEngineError, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde_json::{json, Value};

use crate::config::DelayConfig;
use crate::ports::{config_u64, outputs};
use crate::BlockDescriptor;

/// Interval at which a sleeping delay checks the abort signal
const ABORT_POLL: Duration = Duration::from_millis(50);

/// Delay Block
///
/// The wait is capped at `DelayConfig::max_delay_ms` and ends early with
/// `Cancelled` if the run is aborted while sleeping.
///
/// # Configuration
/// - `ms` - Delay in milliseconds (default: 1000)
pub struct DelayBlock {
    config: DelayConfig,
}

impl DelayBlock {
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_OUTPUT: &'static str = "output";

    pub fn new(config: DelayConfig) -> Self {
        Self { config }
    }

    fn duration(&self, config: &Value) -> Duration {
        let requested = config_u64(config, "ms").unwrap_or(1000);
        Duration::from_millis(requested.min(self.config.max_delay_ms))
    }
}

impl BlockDescriptor for DelayBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("delay", BlockCategory::Action, "Delay")
            .with_description("Waits before passing its input through")
            .input(
                InputPort::optional(Self::PORT_VALUE, "Value", PortDataType::Any)
                    .accepting([PortDataType::Any])
                    .with_default(Value::Null),
            )
            .output(OutputPort::new(Self::PORT_OUTPUT, "Output", PortDataType::Any))
            .with_config_schema(json!({
                "type": "object",
                "properties": { "ms": { "type": "integer", "minimum": 0 } }
            }))
            .with_default_config(json!({ "ms": 1000 }))
    }
}

#[async_trait]
impl BlockExecutor for DelayBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let total = self.duration(config);
        log::debug!("DelayBlock {}: waiting {:?}", ctx.instance_id, total);

        let mut waited = Duration::ZERO;
        while waited < total {
            if ctx.is_aborted() {
                return Err(BlockEngineError::Cancelled);
            }
            let step = ABORT_POLL.min(total - waited);
            tokio::time::sleep(step).await;
            waited += step;
        }

        let value = inputs.get(Self::PORT_VALUE).cloned().unwrap_or(Value::Null);
        Ok(outputs([(Self::PORT_OUTPUT, value)]))
    }
}
