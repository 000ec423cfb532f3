//! # Conductor - semantic agent routing
//!
//! Conductor takes a natural-language query, shortlists the registered agents
//! most relevant to it, asks a language model for an execution plan, narrows
//! each planned agent's tools to the few that matter, and runs the agents
//! concurrently in dependency order before composing a single answer.
//!
//! ## Features
//!
//! - **Semantic selection**: embedding-based top-k over agents and tools, with a
//!   fingerprinted single-flight index cache persisted to disk
//! - **Validated planning**: LM plans are parsed leniently, repaired against the
//!   shortlist and rejected for unknown agents or cycles
//! - **Partial-failure tolerance**: every agent ends in a recorded state; only an
//!   empty catalog fails a run
//! - **MCP tools**: JSON-RPC client with a bounded session pool per server
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conductor::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_path(std::path::Path::new("conductor.toml"))?;
//!     let router = conductor::build_router(&settings).await?;
//!
//!     let result = router.run_query("post the weekly pipeline summary to #sales").await;
//!     println!("{}", result.answer);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: ports for the external collaborators (embeddings, tool providers)
//! - **Agents**: the routing core (catalog, index, selection, planning, orchestration)
//! - **Adapters**: the MCP client implementing the tool-provider port
//! - **Config**: configuration loading and validation

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod domain;

use std::sync::Arc;

use crate::adapters::McpClientManager;
use crate::agents::handler::RouterHandler;
use crate::config::Settings;

/// Wire the MCP client, HTTP providers and catalog into a ready router
pub async fn build_router(settings: &Settings) -> anyhow::Result<RouterHandler> {
    let mcp = McpClientManager::new(&settings.mcp_servers);
    mcp.initialize().await;

    let router = RouterHandler::from_settings(settings, Arc::new(mcp)).await?;
    Ok(router)
}
