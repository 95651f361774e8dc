//! Condition blocks
//!
//! Blocks that branch or compare.

mod compare;
mod if_block;
mod switch;

pub use compare::{CompareBlock, CompareOperator};
pub use if_block::IfBlock;
pub use switch::{SwitchBlock, DEFAULT_CASE};
