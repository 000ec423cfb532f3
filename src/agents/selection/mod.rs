//! Retrieval-based narrowing of the agent and tool catalogs
//!
//! Both selectors treat filtering as an optimisation: when retrieval is
//! unavailable they hand back the unfiltered set and record a degradation
//! instead of failing the run.

mod agents;
mod tools;

pub use agents::{AgentSelection, AgentSelector};
pub use tools::{keyword_rank, ToolSelection, ToolSelector};

/// Index collection holding every registered agent
pub const AGENT_COLLECTION: &str = "agents";

/// Index collection for one provider's tool list
pub fn tool_collection(provider: &str) -> String {
    format!("tools-{}", provider)
}
