//! Output blocks
//!
//! Terminal blocks that show, record or deliver results.

mod display;
mod log_block;
mod markdown;
mod note;
mod notify;

pub use display::DisplayBlock;
pub use log_block::LogBlock;
pub use markdown::{to_markdown, MarkdownBlock};
pub use note::NoteBlock;
pub use notify::{LogNotifier, Notification, NotificationLevel, Notifier, NotifyBlock};
