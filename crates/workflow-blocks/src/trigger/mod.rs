//! Trigger blocks
//!
//! Blocks with no inputs that start a workflow.

mod manual_trigger;

pub use manual_trigger::ManualTriggerBlock;
