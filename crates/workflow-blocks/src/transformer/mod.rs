//! Transformer blocks
//!
//! Pure data transformations: parsing, serialization, expressions,
//! templates, path extraction and list operations.

mod array;
mod code;
mod json_parse;
mod json_stringify;
mod property;
mod template;

pub use array::{ArrayBlock, ArrayOperation};
pub use code::CodeBlock;
pub use json_parse::JsonParseBlock;
pub use json_stringify::JsonStringifyBlock;
pub use property::{extract_path, PropertyBlock};
pub use template::TemplateBlock;
