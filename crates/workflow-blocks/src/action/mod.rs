//! Action blocks
//!
//! Blocks with side effects on the outside world: network calls and timed waits.

mod delay;
mod http_request;

pub use delay::DelayBlock;
pub use http_request::HttpRequestBlock;
