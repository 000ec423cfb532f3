//! Domain types for the routing core

mod agent;
mod message;
mod result;
mod tool_call;

pub use agent::*;
pub use message::*;
pub use result::*;
pub use tool_call::*;
