//! ReAct agent implementation (Reasoning + Acting)

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Agent, AgentOutput, ExecutionContext};
use crate::agents::domain::{Message, PromptSpec, ToolDefinition, ToolInvocation};
use crate::agents::error::{RouterError, RouterResult};
use crate::agents::llm::{CompletionRequest, LlmProvider, ToolChoice};
use crate::agents::orchestration::RetryPolicy;
use crate::domain::ToolProviderPort;

/// ReAct agent: Reasoning + Action loop with tool calling
pub struct ReActAgent {
    name: String,
    prompt: PromptSpec,
    max_iterations: u32,
    llm: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolProviderPort>,
    /// Transient provider errors are retried per call
    retry: RetryPolicy,
}

impl ReActAgent {
    pub fn new(
        name: &str,
        prompt: PromptSpec,
        max_iterations: u32,
        llm: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolProviderPort>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            name: name.to_string(),
            prompt,
            max_iterations: max_iterations.max(1),
            llm,
            tools,
            retry,
        }
    }
}

#[async_trait]
impl Agent for ReActAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &ExecutionContext) -> RouterResult<AgentOutput> {
        let mut messages = Vec::new();
        if !self.prompt.system_prompt.is_empty() {
            messages.push(Message::system(&self.prompt.system_prompt));
        }
        messages.push(Message::user(ctx.user_prompt()));

        let definitions: Vec<ToolDefinition> = ctx.tools.iter().map(ToolDefinition::from).collect();
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let request = CompletionRequest {
                messages: messages.clone(),
                temperature: self.prompt.temperature,
                max_tokens: self.prompt.max_tokens,
                tools: (!definitions.is_empty()).then(|| definitions.clone()),
                tool_choice: (!definitions.is_empty()).then_some(ToolChoice::Auto),
                ..Default::default()
            };

            let response = self.llm.complete(request).await?;
            let tool_calls = response.tool_calls().to_vec();

            // No tool calls means the model has its final answer
            if tool_calls.is_empty() {
                debug!(agent = %self.name, iteration, tools_used = invocations.len(), "ReAct loop finished");
                return Ok(AgentOutput {
                    content: response.message.content,
                    tool_calls: invocations,
                    iterations: iteration,
                });
            }

            messages.push(response.message);

            for call in &tool_calls {
                let started = Instant::now();
                let Some(tool) = ctx.tools.iter().find(|t| t.id == call.name) else {
                    warn!(agent = %self.name, tool = %call.name, "Model called a tool outside its tool set");
                    let reason = format!("unknown tool '{}'", call.name);
                    messages.push(Message::tool_failure(&call.id, &reason));
                    invocations.push(ToolInvocation::failure(&call.name, call.arguments.clone(), reason, 0));
                    continue;
                };

                let provider = &self.tools;
                let arguments = &call.arguments;
                let attempted = self
                    .retry
                    .run(&tool.id, move |_| async move {
                        provider
                            .invoke(&tool.provider, &tool.id, arguments.clone())
                            .await
                            .map_err(RouterError::from)
                    })
                    .await;
                let elapsed = started.elapsed().as_millis() as u64;

                match attempted.result {
                    Ok(output) => {
                        messages.push(Message::tool_result(&call.id, &output));
                        invocations.push(ToolInvocation::success(&call.name, call.arguments.clone(), output, elapsed));
                    }
                    Err(e) => {
                        warn!(agent = %self.name, tool = %call.name, attempts = attempted.attempts, "Tool call failed: {}", e);
                        messages.push(Message::tool_failure(&call.id, &e.to_string()));
                        invocations.push(ToolInvocation::failure(&call.name, call.arguments.clone(), e.to_string(), elapsed));
                    }
                }
            }
        }

        Err(RouterError::AgentExecutionFailed(format!(
            "agent '{}' reached {} iterations without a final answer",
            self.name, self.max_iterations
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::ToolCall;
    use crate::agents::error::{LlmResult, ToolProviderError};
    use crate::agents::llm::CompletionResponse;
    use crate::domain::ToolDescriptor;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    /// Replies with queued responses; records every request
    struct ScriptedLlm {
        replies: Mutex<Vec<CompletionResponse>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    struct EchoTools;

    #[async_trait]
    impl ToolProviderPort for EchoTools {
        async fn list_tools(&self, _: &str) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
            Ok(Vec::new())
        }

        async fn invoke(&self, provider: &str, tool_id: &str, args: Value) -> Result<Value, ToolProviderError> {
            if tool_id == "broken" {
                return Err(ToolProviderError::Invocation {
                    tool: tool_id.to_string(),
                    reason: "bad arguments".to_string(),
                });
            }
            Ok(json!({ "provider": provider, "tool": tool_id, "args": args }))
        }
    }

    fn tool_reply(name: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant_with_tools(
                "",
                vec![ToolCall::new(ToolCall::generate_id(), name, json!({ "q": "acme" }))],
            ),
            finish_reason: crate::agents::llm::FinishReason::ToolCalls,
            usage: None,
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext {
            run_id: Uuid::new_v4(),
            agent: "hubspot".to_string(),
            query: "find acme".to_string(),
            tool_query: "search contacts".to_string(),
            upstream: Vec::new(),
            tools: vec![
                ToolDescriptor::new("hubspot", "search_contacts", "Search contacts"),
                ToolDescriptor::new("hubspot", "broken", "Always fails"),
            ],
        }
    }

    /// Fails with a transport error until `failures` runs out
    struct FlakyTools {
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FlakyTools {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ToolProviderPort for FlakyTools {
        async fn list_tools(&self, _: &str) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
            Ok(Vec::new())
        }

        async fn invoke(&self, _: &str, tool_id: &str, _: Value) -> Result<Value, ToolProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ToolProviderError::Transport("connection reset".to_string()));
            }
            Ok(json!({ "tool": tool_id, "contacts": 2 }))
        }
    }

    fn retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
        }
    }

    fn agent_with(
        replies: Vec<CompletionResponse>,
        max_iterations: u32,
        tools: Arc<dyn ToolProviderPort>,
    ) -> (ReActAgent, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        });
        let agent = ReActAgent::new(
            "hubspot",
            PromptSpec::new("You manage the CRM."),
            max_iterations,
            llm.clone(),
            tools,
            retry(),
        );
        (agent, llm)
    }

    fn agent(replies: Vec<CompletionResponse>, max_iterations: u32) -> (ReActAgent, Arc<ScriptedLlm>) {
        agent_with(replies, max_iterations, Arc::new(EchoTools))
    }

    #[tokio::test]
    async fn test_tool_result_is_fed_back() {
        let (agent, llm) = agent(
            vec![tool_reply("search_contacts"), CompletionResponse::text("Acme has 2 contacts")],
            5,
        );

        let output = agent.run(&context()).await.unwrap();
        assert_eq!(output.content, "Acme has 2 contacts");
        assert_eq!(output.iterations, 2);
        assert!(output.tool_calls[0].success);

        let requests = llm.requests.lock().unwrap();
        let last = requests.last().unwrap();
        let tool_msg = last.messages.last().unwrap();
        assert!(tool_msg.content.contains("search_contacts"));
        assert_eq!(requests[0].tools.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_and_unknown_tools_are_recorded() {
        let (agent, _) = agent(
            vec![tool_reply("broken"), tool_reply("delete_everything"), CompletionResponse::text("done")],
            5,
        );

        let output = agent.run(&context()).await.unwrap();
        assert_eq!(output.tool_calls.len(), 2);
        assert!(output.tool_calls.iter().all(|c| !c.success));
    }

    #[tokio::test]
    async fn test_iteration_limit_is_an_execution_failure() {
        let (agent, _) = agent(vec![tool_reply("search_contacts"), tool_reply("search_contacts")], 2);
        let err = agent.run(&context()).await.unwrap_err();
        assert!(matches!(err, RouterError::AgentExecutionFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_tool_error_is_retried() {
        let tools = FlakyTools::new(1);
        let (agent, _) = agent_with(
            vec![tool_reply("search_contacts"), CompletionResponse::text("Acme has 2 contacts")],
            5,
            tools.clone(),
        );

        let output = agent.run(&context()).await.unwrap();
        assert_eq!(tools.calls.load(Ordering::SeqCst), 2);
        assert!(output.tool_calls[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_retries_are_bounded() {
        let tools = FlakyTools::new(10);
        let (agent, _) = agent_with(
            vec![tool_reply("search_contacts"), CompletionResponse::text("CRM is unreachable")],
            5,
            tools.clone(),
        );

        let output = agent.run(&context()).await.unwrap();
        assert_eq!(tools.calls.load(Ordering::SeqCst), 3);
        assert!(!output.tool_calls[0].success);
        assert!(output.tool_calls[0].error.as_deref().unwrap().contains("connection reset"));
    }
}
