//! Run result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::ToolInvocation;
use crate::agents::error::{FailureKind, RouterError};
use crate::agents::planner::Plan;

/// Phases of one run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Received,
    Selected,
    Planned,
    ToolsFiltered,
    Executing,
    Aggregated,
    Completed,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Received => "RECEIVED",
            RunPhase::Selected => "SELECTED",
            RunPhase::Planned => "PLANNED",
            RunPhase::ToolsFiltered => "TOOLS_FILTERED",
            RunPhase::Executing => "EXECUTING",
            RunPhase::Aggregated => "AGGREGATED",
            RunPhase::Completed => "COMPLETED",
            RunPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Terminal state of one agent within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Succeeded,
    /// Produced output with reduced capability
    Degraded,
    Failed,
    /// Not invoked because an upstream agent did not succeed
    DependencyFailed,
    /// In flight when the run deadline expired
    Cancelled,
    /// Not started when the run deadline expired
    Skipped,
}

impl AgentStatus {
    /// Whether the agent produced usable output
    pub fn is_success(self) -> bool {
        matches!(self, AgentStatus::Succeeded | AgentStatus::Degraded)
    }
}

/// Failure or degradation with a human-readable cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    pub kind: FailureKind,
    pub message: String,
}

impl Cause {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&RouterError> for Cause {
    fn from(err: &RouterError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// What happened to one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Cause>,
    /// Reduced-capability conditions (e.g. no tools)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Cause>,
    /// Tool ids the agent was equipped with
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl AgentOutcome {
    /// Successful output; downgraded to `Degraded` when degradations are present
    pub fn success(output: String, degradations: Vec<Cause>) -> Self {
        let status = if degradations.is_empty() {
            AgentStatus::Succeeded
        } else {
            AgentStatus::Degraded
        };
        Self {
            status,
            output: Some(output),
            failure: None,
            degradations,
            tools: Vec::new(),
            tool_calls: Vec::new(),
            attempts: 0,
            elapsed_ms: 0,
        }
    }

    pub fn failed(error: &RouterError, degradations: Vec<Cause>) -> Self {
        Self::terminal(AgentStatus::Failed, Cause::from(error), degradations)
    }

    pub fn dependency_failed(dependency: &str) -> Self {
        let err = RouterError::DependencyFailed(dependency.to_string());
        Self::terminal(AgentStatus::DependencyFailed, Cause::from(&err), Vec::new())
    }

    pub fn cancelled() -> Self {
        Self::terminal(
            AgentStatus::Cancelled,
            Cause::new(FailureKind::DeadlineExceeded, "cancelled in flight at run deadline"),
            Vec::new(),
        )
    }

    pub fn skipped() -> Self {
        Self::terminal(
            AgentStatus::Skipped,
            Cause::new(FailureKind::DeadlineExceeded, "not started before run deadline"),
            Vec::new(),
        )
    }

    fn terminal(status: AgentStatus, cause: Cause, degradations: Vec<Cause>) -> Self {
        Self {
            status,
            output: None,
            failure: Some(cause),
            degradations,
            tools: Vec::new(),
            tool_calls: Vec::new(),
            attempts: 0,
            elapsed_ms: 0,
        }
    }
}

/// Sealed result of one `run_query` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub run_id: Uuid,
    pub query: String,
    pub status: RunStatus,
    /// Plan as executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    pub agents: BTreeMap<String, AgentOutcome>,
    /// Aggregated answer from every successful output
    pub answer: String,
    /// Run-level degradations (unfiltered selection, fallback plan, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Cause>,
    /// Set only when the run failed as a whole
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl OrchestrationResult {
    pub fn outcome(&self, agent: &str) -> Option<&AgentOutcome> {
        self.agents.get(agent)
    }

    /// Number of agents in the given state
    pub fn count(&self, status: AgentStatus) -> usize {
        self.agents.values().filter(|o| o.status == status).count()
    }

    pub fn successful(&self) -> impl Iterator<Item = (&String, &AgentOutcome)> {
        self.agents.iter().filter(|(_, o)| o.status.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_degradation_is_degraded() {
        let outcome = AgentOutcome::success(
            "ok".to_string(),
            vec![Cause::new(FailureKind::ToolProviderUnavailable, "no tools")],
        );
        assert_eq!(outcome.status, AgentStatus::Degraded);
        assert!(outcome.status.is_success());
    }

    #[test]
    fn test_dependency_failed_names_upstream() {
        let outcome = AgentOutcome::dependency_failed("hubspot");
        let cause = outcome.failure.unwrap();
        assert_eq!(cause.kind, FailureKind::DependencyFailed);
        assert!(cause.message.contains("hubspot"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::ToolsFiltered.to_string(), "TOOLS_FILTERED");
        assert_eq!(
            serde_json::to_value(RunPhase::ToolsFiltered).unwrap(),
            serde_json::json!("TOOLS_FILTERED")
        );
    }
}
