//! Notify Block
//!
//! Sends a notification through the host's [`Notifier`].

use std::sync::Arc;

use async_trait::async_trait;
use block_engine::{
    extension_keys, BlockCategory, BlockDefinition, BlockExecutor, BlockInputs, BlockOutputs, ExecutionContext,
    InputPort, OutputPort, PortDataType, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ports::{config_str, outputs, require_text};
use crate::BlockDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
}

/// Delivers notifications to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name reported by the block
    fn name(&self) -> &str;

    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Notifier that writes to the application log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let level = match notification.level {
            NotificationLevel::Error => log::Level::Error,
            NotificationLevel::Warning => log::Level::Warn,
            _ => log::Level::Info,
        };
        log::log!(level, "{}: {}", notification.title, notification.message);
        Ok(())
    }
}

/// Notify Block
///
/// Falls back to [`LogNotifier`] when no notifier is registered under
/// `extension_keys::NOTIFIER`.
///
/// # Configuration
/// - `title` - Notification title (default: "Workflow")
/// - `level` - info, success, warning or error
pub struct NotifyBlock;

impl NotifyBlock {
    pub const PORT_MESSAGE: &'static str = "message";
    pub const PORT_DELIVERED: &'static str = "delivered";
    pub const PORT_CHANNEL: &'static str = "channel";
}

impl BlockDescriptor for NotifyBlock {
    fn definition() -> BlockDefinition {
        BlockDefinition::new("notify", BlockCategory::Output, "Notify")
            .with_description("Sends a notification")
            .input(InputPort::required(Self::PORT_MESSAGE, "Message", PortDataType::Text))
            .output(OutputPort::new(Self::PORT_DELIVERED, "Delivered", PortDataType::Boolean))
            .output(OutputPort::new(Self::PORT_CHANNEL, "Channel", PortDataType::Text))
            .with_config_schema(json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "level": { "type": "string", "enum": ["info", "success", "warning", "error"] }
                }
            }))
            .with_default_config(json!({ "title": "Workflow", "level": "info" }))
    }
}

#[async_trait]
impl BlockExecutor for NotifyBlock {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: BlockInputs,
        config: &serde_json::Value,
    ) -> Result<BlockOutputs> {
        let notification = Notification {
            title: config_str(config, "title").unwrap_or("Workflow").to_string(),
            message: require_text(&inputs, Self::PORT_MESSAGE)?,
            level: config
                .get("level")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
        };

        let fallback: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let notifier = ctx
            .extensions
            .get::<Arc<dyn Notifier>>(extension_keys::NOTIFIER)
            .unwrap_or(&fallback);

        notifier.notify(&notification).await?;
        log::debug!("NotifyBlock {}: delivered via {}", ctx.instance_id, notifier.name());

        Ok(outputs([
            (Self::PORT_DELIVERED, json!(true)),
            (Self::PORT_CHANNEL, json!(notifier.name())),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_engine::ExecutorExtensions;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(&self, notification: &Notification) -> Result<()> {
            self.sent.lock().push(notification.clone());
            Ok(())
        }
    }

    fn message(text: &str) -> BlockInputs {
        let mut inputs = BlockInputs::new();
        inputs.insert("message".into(), json!(text));
        inputs
    }

    #[tokio::test]
    async fn test_uses_registered_notifier() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier: Arc<dyn Notifier> = recorder.clone();
        let mut ext = ExecutorExtensions::new();
        ext.set(extension_keys::NOTIFIER, notifier);
        let ctx = ExecutionContext::new("n", &ext);

        let out = NotifyBlock
            .execute(&ctx, message("done"), &json!({"title": "Build", "level": "success"}))
            .await
            .unwrap();
        assert_eq!(out["channel"], "recording");
        assert_eq!(
            recorder.sent.lock()[0],
            Notification {
                title: "Build".into(),
                message: "done".into(),
                level: NotificationLevel::Success,
            }
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_log() {
        let ext = ExecutorExtensions::new();
        let ctx = ExecutionContext::new("n", &ext);
        let out = NotifyBlock.execute(&ctx, message("hi"), &json!({})).await.unwrap();
        assert_eq!(out["delivered"], true);
        assert_eq!(out["channel"], "log");
    }
}
