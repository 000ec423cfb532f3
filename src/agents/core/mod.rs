//! Agent execution units
//!
//! A unit is built fresh for every run from its descriptor's
//! [`AgentFactory`] and owns its [`ExecutionContext`] exclusively:
//! - SingleTurnAgent: one completion, no tools
//! - ReActAgent: reasoning + action loop over the filtered tool set
//! - custom units supplied by an [`AgentBuilder`](crate::agents::domain::AgentBuilder)

mod react;
mod single_turn;

pub use react::ReActAgent;
pub use single_turn::SingleTurnAgent;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{AgentDescriptor, AgentFactory, PromptSpec, ToolInvocation};
use crate::agents::error::RouterResult;
use crate::agents::llm::LlmProvider;
use crate::agents::orchestration::RetryPolicy;
use crate::domain::{ToolDescriptor, ToolProviderPort};

/// Output of a dependency, handed to its dependents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamOutput {
    pub agent: String,
    pub output: String,
}

/// Everything one agent sees during a run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub agent: String,
    /// The user query
    pub query: String,
    /// The planner's tool-search phrase for this agent
    pub tool_query: String,
    /// Outputs of the agent's dependencies, in plan order
    pub upstream: Vec<UpstreamOutput>,
    /// Filtered tool set
    pub tools: Vec<ToolDescriptor>,
}

impl ExecutionContext {
    /// User message: the query plus any upstream data to work from
    pub fn user_prompt(&self) -> String {
        if self.upstream.is_empty() {
            return self.query.clone();
        }

        let mut prompt = String::from("Data from previous steps:\n");
        for upstream in &self.upstream {
            prompt.push_str(&format!("\n[{}]\n{}\n", upstream.agent, upstream.output));
        }
        prompt.push_str(
            "\nUse the data above directly. Do not fetch it again from your own sources.\n\nTask: ",
        );
        prompt.push_str(&self.query);
        prompt
    }
}

/// What an agent produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    pub iterations: u32,
}

impl AgentOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            iterations: 1,
        }
    }
}

/// Trait for executable agents
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Execute the agent once
    async fn run(&self, ctx: &ExecutionContext) -> RouterResult<AgentOutput>;
}

/// Shared collaborators needed to instantiate the built-in variants
#[derive(Clone)]
pub struct AgentRuntime {
    pub llm: Arc<dyn LlmProvider>,
    pub tools: Arc<dyn ToolProviderPort>,
    /// Defaults for prompts that leave temperature/max tokens unset
    pub llm_defaults: LlmProviderConfig,
    /// Applied to each tool call
    pub tool_retry: RetryPolicy,
}

/// Instantiate a fresh execution unit for one run
pub fn create_agent(descriptor: &AgentDescriptor, runtime: &AgentRuntime) -> Arc<dyn Agent> {
    match &descriptor.factory {
        AgentFactory::SingleTurn(prompt) => Arc::new(SingleTurnAgent::new(
            &descriptor.name,
            resolve_prompt(prompt, &runtime.llm_defaults),
            runtime.llm.clone(),
        )),
        AgentFactory::ReAct {
            prompt,
            max_iterations,
        } => Arc::new(ReActAgent::new(
            &descriptor.name,
            resolve_prompt(prompt, &runtime.llm_defaults),
            *max_iterations,
            runtime.llm.clone(),
            runtime.tools.clone(),
            runtime.tool_retry.clone(),
        )),
        AgentFactory::Custom(builder) => builder.build(descriptor),
    }
}

fn resolve_prompt(prompt: &PromptSpec, defaults: &LlmProviderConfig) -> PromptSpec {
    PromptSpec {
        system_prompt: prompt.system_prompt.clone(),
        temperature: prompt.temperature.or(defaults.temperature),
        max_tokens: prompt.max_tokens.or(defaults.max_tokens),
    }
}
