//! Final answer composition

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::agents::config::MergeStrategy;
use crate::agents::domain::{AgentOutcome, Cause, Message};
use crate::agents::error::FailureKind;
use crate::agents::llm::{CompletionRequest, LlmProvider};
use crate::agents::planner::Plan;

const SUMMARY_PROMPT: &str = "You combine the results of several specialised agents into one answer for the user. \
Use only the information in the results. Be concise and mention anything an agent could not complete.";

/// Successful outputs in plan order
fn successful_outputs<'a>(
    plan: &'a Plan,
    outcomes: &'a BTreeMap<String, AgentOutcome>,
) -> Vec<(&'a str, &'a str)> {
    plan.agents()
        .filter_map(|name| {
            let outcome = outcomes.get(name)?;
            if !outcome.status.is_success() {
                return None;
            }
            outcome.output.as_deref().map(|out| (name, out))
        })
        .collect()
}

/// Concatenate successful outputs under a header per agent
pub fn concat(plan: &Plan, outcomes: &BTreeMap<String, AgentOutcome>) -> String {
    let outputs = successful_outputs(plan, outcomes);
    if outputs.len() == 1 {
        return outputs[0].1.to_string();
    }

    outputs
        .iter()
        .map(|(name, out)| format!("## {}\n{}", name, out))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Compose the answer; summarising falls back to concatenation on failure
pub async fn aggregate(
    strategy: MergeStrategy,
    query: &str,
    plan: &Plan,
    outcomes: &BTreeMap<String, AgentOutcome>,
    llm: &Arc<dyn LlmProvider>,
    timeout: Duration,
) -> (String, Option<Cause>) {
    let outputs = successful_outputs(plan, outcomes);
    if strategy == MergeStrategy::Concat || outputs.len() < 2 {
        return (concat(plan, outcomes), None);
    }

    let mut results = String::new();
    for (name, out) in &outputs {
        results.push_str(&format!("[{}]\n{}\n\n", name, out));
    }
    for name in plan.agents() {
        if let Some(outcome) = outcomes.get(name).filter(|o| !o.status.is_success()) {
            let cause = outcome
                .failure
                .as_ref()
                .map(|c| c.message.as_str())
                .unwrap_or("no output");
            results.push_str(&format!("[{}] did not complete: {}\n", name, cause));
        }
    }

    let request = CompletionRequest::new(vec![
        Message::system(SUMMARY_PROMPT),
        Message::user(format!("Query: {}\n\nResults:\n{}", query, results)),
    ]);

    let failure = match tokio::time::timeout(timeout, llm.complete(request)).await {
        Ok(Ok(response)) if !response.message.content.trim().is_empty() => {
            return (response.message.content, None);
        }
        Ok(Ok(_)) => "summary was empty".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(_) => "summary timed out".to_string(),
    };

    warn!("Summarising aggregation failed, concatenating instead: {}", failure);
    (
        concat(plan, outcomes),
        Some(Cause::new(
            FailureKind::AggregationFailed,
            format!("answer not summarised: {}", failure),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::error::{LlmError, LlmResult};
    use crate::agents::error::RouterError;
    use crate::agents::llm::CompletionResponse;
    use crate::agents::planner::PlanStep;
    use async_trait::async_trait;

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn name(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _: CompletionRequest) -> LlmResult<CompletionResponse> {
            Err(LlmError::Api { status: 500, message: "down".into() })
        }
    }

    fn fixture() -> (Plan, BTreeMap<String, AgentOutcome>) {
        let plan = Plan {
            steps: vec![PlanStep::new("slack"), PlanStep::new("hubspot"), PlanStep::new("zomato")],
            rationale: String::new(),
            fallback: false,
        };
        let mut outcomes = BTreeMap::new();
        outcomes.insert("slack".to_string(), AgentOutcome::success("posted".into(), Vec::new()));
        outcomes.insert("hubspot".to_string(), AgentOutcome::success("3 contacts".into(), Vec::new()));
        outcomes.insert(
            "zomato".to_string(),
            AgentOutcome::failed(&RouterError::AgentExecutionFailed("boom".into()), Vec::new()),
        );
        (plan, outcomes)
    }

    #[test]
    fn test_concat_follows_plan_order_and_skips_failures() {
        let (plan, outcomes) = fixture();
        assert_eq!(concat(&plan, &outcomes), "## slack\nposted\n\n## hubspot\n3 contacts");
    }

    #[tokio::test]
    async fn test_summary_failure_falls_back_to_concat() {
        let (plan, outcomes) = fixture();
        let llm: Arc<dyn LlmProvider> = Arc::new(FailingLlm);
        let (answer, degradation) = aggregate(
            MergeStrategy::Summarize,
            "q",
            &plan,
            &outcomes,
            &llm,
            Duration::from_secs(1),
        )
        .await;

        assert!(answer.starts_with("## slack"));
        let degradation = degradation.unwrap();
        assert_eq!(degradation.kind, FailureKind::AggregationFailed);
        assert!(degradation.message.contains("not summarised"));
    }
}
