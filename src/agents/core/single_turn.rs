//! Single-turn agent implementation

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Agent, AgentOutput, ExecutionContext};
use crate::agents::domain::{Message, PromptSpec};
use crate::agents::error::{RouterError, RouterResult};
use crate::agents::llm::{CompletionRequest, LlmProvider};

/// Single-turn agent: one request → one response, no tools
pub struct SingleTurnAgent {
    name: String,
    prompt: PromptSpec,
    llm: Arc<dyn LlmProvider>,
}

impl SingleTurnAgent {
    pub fn new(name: &str, prompt: PromptSpec, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.to_string(),
            prompt,
            llm,
        }
    }
}

#[async_trait]
impl Agent for SingleTurnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &ExecutionContext) -> RouterResult<AgentOutput> {
        let mut messages = Vec::with_capacity(2);
        if !self.prompt.system_prompt.is_empty() {
            messages.push(Message::system(&self.prompt.system_prompt));
        }
        messages.push(Message::user(ctx.user_prompt()));

        let request = CompletionRequest {
            messages,
            temperature: self.prompt.temperature,
            max_tokens: self.prompt.max_tokens,
            ..Default::default()
        };

        let response = self.llm.complete(request).await?;
        let content = response.message.content;
        if content.trim().is_empty() {
            return Err(RouterError::AgentExecutionFailed(format!(
                "agent '{}' produced no output",
                self.name
            )));
        }

        debug!(agent = %self.name, chars = content.len(), "Single-turn agent finished");
        Ok(AgentOutput::text(content))
    }
}
