//! Planner: asks the language model which shortlisted agents to run, with
//! what tool-search phrase and in which order
//!
//! The model's answer is never trusted as-is. It is decoded leniently
//! ([`parse_plan`]) and then validated against the shortlist
//! ([`Plan::validate`]). Any failure along the way yields the fallback plan.

mod parse;
mod plan;

pub use parse::{parse_plan, strip_code_fence, RawPlan};
pub use plan::{Plan, PlanStep};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::agents::domain::{AgentDescriptor, Cause, Message};
use crate::agents::error::{FailureKind, RouterError, RouterResult};
use crate::agents::llm::{CompletionRequest, LlmProvider};

const PLANNER_PROMPT: &str = r#"You are a task planning assistant. Decide which of the available agents are needed to answer the user's query.

Rules:
- Only choose agents from the list. Select every agent the task needs; a task that fetches data from one system and sends it to another needs both.
- For each agent that uses tools, write a short tool search phrase describing the tools it needs (for example "search list contacts email"). Leave it empty for agents without tools.
- If an agent needs the output of another agent, list that agent in its "depends_on".

Respond ONLY with a JSON object in this format:
{
  "agents": [
    {"name": "agent_a", "tool_query": "phrase for agent_a", "depends_on": []},
    {"name": "agent_b", "tool_query": "phrase for agent_b", "depends_on": ["agent_a"]}
  ],
  "rationale": "one sentence"
}"#;

/// Planner result; `degradation` is set when the fallback plan was used
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub degradation: Option<Cause>,
}

pub struct Planner {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Produce a valid plan over `shortlist`; never fails
    #[instrument(skip(self, shortlist), fields(shortlist = shortlist.len()))]
    pub async fn plan(&self, query: &str, shortlist: &[Arc<AgentDescriptor>]) -> PlanOutcome {
        match self.try_plan(query, shortlist).await {
            Ok(plan) => {
                debug!(agents = ?plan.agents().collect::<Vec<_>>(), "Plan accepted");
                PlanOutcome {
                    plan,
                    degradation: None,
                }
            }
            Err(e) => {
                warn!("Planning failed, using the shortlist as the plan: {}", e);
                PlanOutcome {
                    plan: Plan::fallback(query, shortlist),
                    degradation: Some(Cause::new(FailureKind::PlanningFailed, e.to_string())),
                }
            }
        }
    }

    async fn try_plan(&self, query: &str, shortlist: &[Arc<AgentDescriptor>]) -> RouterResult<Plan> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(PLANNER_PROMPT),
                Message::user(planning_input(query, shortlist)),
            ],
            temperature: Some(0.0),
            json_mode: true,
            ..Default::default()
        };

        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| RouterError::PlanningFailed("language model timed out".to_string()))?
            .map_err(|e| RouterError::PlanningFailed(e.to_string()))?;

        let raw = parse_plan(&response.message.content)?;
        Plan::validate(raw.steps, raw.rationale, shortlist, query)
    }
}

fn planning_input(query: &str, shortlist: &[Arc<AgentDescriptor>]) -> String {
    let agents = shortlist
        .iter()
        .map(|a| {
            let tools = if a.requires_tools { " (uses tools)" } else { "" };
            format!("- {}{}: {}", a.name, tools, a.description)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("Available agents:\n{}\n\nQuery: {}", agents, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::{AgentFactory, PromptSpec};
    use crate::agents::error::{LlmError, LlmResult};
    use crate::agents::llm::CompletionResponse;
    use async_trait::async_trait;

    struct FixedLlm(Result<String, ()>);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: CompletionRequest) -> LlmResult<CompletionResponse> {
            match &self.0 {
                Ok(text) => Ok(CompletionResponse::text(text.clone())),
                Err(()) => Err(LlmError::Network("connection reset".to_string())),
            }
        }
    }

    fn shortlist() -> Vec<Arc<AgentDescriptor>> {
        let factory = || AgentFactory::SingleTurn(PromptSpec::default());
        vec![
            Arc::new(AgentDescriptor::new("hubspot", "CRM", factory()).with_tools("hubspot")),
            Arc::new(AgentDescriptor::new("slack", "Chat", factory()).with_tools("slack")),
        ]
    }

    fn planner(reply: Result<&str, ()>) -> Planner {
        Planner::new(
            Arc::new(FixedLlm(reply.map(str::to_string))),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_valid_plan_accepted() {
        let reply = r#"{"agents": [{"name": "slack", "tool_query": "post", "depends_on": ["hubspot"]}, {"name": "hubspot", "tool_query": "contacts"}]}"#;
        let outcome = planner(Ok(reply)).plan("post contacts", &shortlist()).await;

        assert!(outcome.degradation.is_none());
        assert_eq!(outcome.plan.agents().collect::<Vec<_>>(), vec!["hubspot", "slack"]);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let outcome = planner(Err(())).plan("post contacts", &shortlist()).await;

        assert!(outcome.plan.fallback);
        assert_eq!(outcome.plan.len(), 2);
        assert_eq!(outcome.degradation.unwrap().kind, FailureKind::PlanningFailed);
    }

    #[tokio::test]
    async fn test_cyclic_plan_falls_back() {
        let reply = r#"{"agents": ["hubspot", "slack"], "depends_on": {"hubspot": ["slack"], "slack": ["hubspot"]}}"#;
        let outcome = planner(Ok(reply)).plan("q", &shortlist()).await;
        assert!(outcome.plan.fallback);
        assert!(outcome.plan.steps.iter().all(|s| s.tool_query == "q"));
    }

    #[tokio::test]
    async fn test_plan_outside_shortlist_falls_back() {
        let outcome = planner(Ok(r#"{"agents": ["jira"]}"#)).plan("q", &shortlist()).await;
        assert!(outcome.plan.fallback);
    }
}
