//! Configuration types for agents, collaborators and the routing pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration for a registered agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent name
    pub name: String,
    /// Free-text description, used for retrieval and planning
    pub description: String,
    /// Capability tags
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Whether the agent needs tools from an MCP provider
    #[serde(default)]
    pub requires_tools: bool,
    /// MCP server supplying this agent's tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_provider: Option<String>,
    /// Execution-unit variant
    #[serde(default)]
    pub agent_type: AgentType,
    /// System prompt for the agent
    #[serde(default)]
    pub system_prompt: String,
    /// Maximum iterations for ReAct agents
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Temperature override (if not set, uses LLM config default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Max tokens override (if not set, uses LLM config default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_max_iterations() -> u32 {
    10
}

/// Agent type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Single request → single response
    #[default]
    SingleTurn,
    /// Reasoning + Action loop with tool calling
    #[serde(rename = "react")]
    ReAct,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::SingleTurn => write!(f, "single_turn"),
            AgentType::ReAct => write!(f, "react"),
        }
    }
}

/// LLM provider configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmProviderConfig {
    /// Model name/identifier
    pub model: String,
    /// Environment variable containing the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Custom base URL (for self-hosted or proxied endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Default max tokens for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key_env: None,
            base_url: None,
            temperature: Some(0.2),
            max_tokens: None,
            timeout_seconds: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> u64 {
    60
}

/// Embedding provider configuration (OpenAI-compatible embeddings endpoint)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            api_key_env: None,
            base_url: None,
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

fn default_embedding_timeout() -> u64 {
    15
}

/// Tuning knobs for selection, planning and orchestration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Agent Selector top-k
    #[serde(default = "default_shortlist_k")]
    pub shortlist_k: usize,
    /// Tool Selector top-k
    #[serde(default = "default_tool_k")]
    pub tool_k: usize,
    /// Cap on the unfiltered tool set used when retrieval is unavailable
    #[serde(default = "default_max_tools_per_agent")]
    pub max_tools_per_agent: usize,
    /// Maximum agents executing at once within a run
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Run-level deadline in seconds
    #[serde(default = "default_deadline")]
    pub deadline_seconds: u64,
    /// Per-invocation timeout in seconds
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_seconds: u64,
    /// Retries after the first attempt, transient failures only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Keyword pre-ranking before semantic tool search
    #[serde(default = "default_true")]
    pub hybrid_tool_search: bool,
    /// How successful outputs become the final answer
    #[serde(default)]
    pub aggregation: MergeStrategy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            shortlist_k: default_shortlist_k(),
            tool_k: default_tool_k(),
            max_tools_per_agent: default_max_tools_per_agent(),
            concurrency: default_concurrency(),
            deadline_seconds: default_deadline(),
            agent_timeout_seconds: default_agent_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            hybrid_tool_search: true,
            aggregation: MergeStrategy::default(),
        }
    }
}

fn default_shortlist_k() -> usize {
    3
}

fn default_tool_k() -> usize {
    5
}

fn default_max_tools_per_agent() -> usize {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_deadline() -> u64 {
    120
}

fn default_agent_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

/// Strategies for composing the final answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Concatenate successful outputs in plan order
    #[default]
    Concat,
    /// Ask the language model to compose one answer
    Summarize,
}
