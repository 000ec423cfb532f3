//! Agent descriptor types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::agents::config::{AgentConfig, AgentType};
use crate::agents::core::Agent;

/// Registered agent: retrieval text, tool requirements and how to instantiate it.
///
/// Immutable once registered in the [`AgentCatalog`](crate::agents::catalog::AgentCatalog).
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Unique key in the catalog
    pub name: String,
    /// Free text embedded for agent selection
    pub description: String,
    pub capabilities: BTreeSet<String>,
    pub requires_tools: bool,
    /// MCP provider supplying this agent's tools
    pub tool_provider: Option<String>,
    pub factory: AgentFactory,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, factory: AgentFactory) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: BTreeSet::new(),
            requires_tools: false,
            tool_provider: None,
            factory,
        }
    }

    /// Bind this agent to a tool provider
    pub fn with_tools(mut self, provider: impl Into<String>) -> Self {
        self.requires_tools = true;
        self.tool_provider = Some(provider.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Text used when indexing this agent for retrieval
    pub fn index_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    /// Serializable view of this descriptor
    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            requires_tools: self.requires_tools,
            tool_provider: self.tool_provider.clone(),
            agent_type: self.factory.kind().to_string(),
        }
    }
}

impl From<AgentConfig> for AgentDescriptor {
    fn from(config: AgentConfig) -> Self {
        let prompt = PromptSpec {
            system_prompt: config.system_prompt,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        let factory = match config.agent_type {
            AgentType::SingleTurn => AgentFactory::SingleTurn(prompt),
            AgentType::ReAct => AgentFactory::ReAct {
                prompt,
                max_iterations: config.max_iterations,
            },
        };

        Self {
            name: config.name,
            description: config.description,
            capabilities: config.capabilities,
            requires_tools: config.requires_tools,
            tool_provider: config.tool_provider,
            factory,
        }
    }
}

/// Prompt settings shared by the LLM-backed variants
#[derive(Debug, Clone, Default)]
pub struct PromptSpec {
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl PromptSpec {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }
}

/// Host-supplied constructor for agents outside the built-in variants
pub trait AgentBuilder: Send + Sync {
    /// Instantiate a fresh agent for one run
    fn build(&self, descriptor: &AgentDescriptor) -> Arc<dyn Agent>;

    fn kind(&self) -> &str {
        "custom"
    }
}

/// Closed set of execution-unit constructors
#[derive(Clone)]
pub enum AgentFactory {
    /// One completion call, no tools
    SingleTurn(PromptSpec),
    /// Reason/act loop over the filtered tool set
    ReAct { prompt: PromptSpec, max_iterations: u32 },
    Custom(Arc<dyn AgentBuilder>),
}

impl AgentFactory {
    pub fn kind(&self) -> &str {
        match self {
            AgentFactory::SingleTurn(_) => "single_turn",
            AgentFactory::ReAct { .. } => "react",
            AgentFactory::Custom(builder) => builder.kind(),
        }
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentFactory::SingleTurn(prompt) => f.debug_tuple("SingleTurn").field(prompt).finish(),
            AgentFactory::ReAct { prompt, max_iterations } => f
                .debug_struct("ReAct")
                .field("prompt", prompt)
                .field("max_iterations", max_iterations)
                .finish(),
            AgentFactory::Custom(builder) => write!(f, "Custom({})", builder.kind()),
        }
    }
}

/// Agent information returned from list operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<String>,
    pub requires_tools: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_provider: Option<String>,
    pub agent_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_config() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({
            "name": "hubspot",
            "description": "Reads CRM contacts and deals",
            "requires_tools": true,
            "tool_provider": "hubspot",
            "agent_type": "react",
            "max_iterations": 4,
            "system_prompt": "You manage the CRM."
        }))
        .unwrap();

        let descriptor = AgentDescriptor::from(config);
        assert_eq!(descriptor.factory.kind(), "react");
        assert!(matches!(
            descriptor.factory,
            AgentFactory::ReAct { max_iterations: 4, .. }
        ));
        assert_eq!(descriptor.index_text(), "hubspot: Reads CRM contacts and deals");
    }

    #[test]
    fn test_info_reflects_descriptor() {
        let descriptor = AgentDescriptor::new("slack", "Posts messages", AgentFactory::SingleTurn(PromptSpec::new("hi")))
            .with_tools("slack")
            .with_capability("messaging");
        let info = descriptor.info();
        assert!(info.requires_tools);
        assert_eq!(info.tool_provider.as_deref(), Some("slack"));
        assert_eq!(info.agent_type, "single_turn");
        assert!(info.capabilities.contains("messaging"));
    }
}
