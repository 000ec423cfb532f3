pub mod mcp_client;

pub use mcp_client::{McpClientManager, McpTool};
