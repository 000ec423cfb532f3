//! Plan shape and the validation/repair step applied to every parsed plan

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use crate::agents::domain::AgentDescriptor;
use crate::agents::error::{RouterError, RouterResult};

/// One selected agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent: String,
    /// Phrase used to search the agent's tools; empty for tool-less agents
    #[serde(default)]
    pub tool_query: String,
    /// Agents that must reach a terminal state first; always earlier in the plan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl PlanStep {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            tool_query: String::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_tool_query(mut self, tool_query: impl Into<String>) -> Self {
        self.tool_query = tool_query.into();
        self
    }

    pub fn depends_on(mut self, agent: impl Into<String>) -> Self {
        self.depends_on.push(agent.into());
        self
    }
}

/// Validated execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    /// Informational only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rationale: String,
    /// Built from the shortlist because planning failed
    #[serde(default)]
    pub fallback: bool,
}

impl Plan {
    /// Every shortlisted agent, no dependencies, tool queries set to the user query
    pub fn fallback(query: &str, shortlist: &[Arc<AgentDescriptor>]) -> Self {
        let steps = shortlist
            .iter()
            .map(|agent| {
                let step = PlanStep::new(&agent.name);
                if agent.requires_tools {
                    step.with_tool_query(query)
                } else {
                    step
                }
            })
            .collect();

        Self {
            steps,
            rationale: String::new(),
            fallback: true,
        }
    }

    /// Check raw steps against the shortlist and repair what can be repaired.
    ///
    /// - agents outside the shortlist and repeated agents are dropped
    /// - dependencies on agents not in the plan are dropped
    /// - steps are stably reordered so every dependency comes first
    /// - tool queries are cleared for tool-less agents and default to `query`
    ///
    /// Self-dependencies, cycles and an empty result reject the plan.
    pub fn validate(
        steps: Vec<PlanStep>,
        rationale: String,
        shortlist: &[Arc<AgentDescriptor>],
        query: &str,
    ) -> RouterResult<Self> {
        let allowed: HashMap<&str, &AgentDescriptor> = shortlist
            .iter()
            .map(|a| (a.name.as_str(), a.as_ref()))
            .collect();

        let mut seen = HashSet::new();
        let mut kept: Vec<PlanStep> = Vec::new();
        for mut step in steps {
            let Some(agent) = allowed.get(step.agent.as_str()) else {
                warn!(agent = %step.agent, "Planner chose an agent outside the shortlist, dropping");
                continue;
            };
            if !seen.insert(step.agent.clone()) {
                warn!(agent = %step.agent, "Planner listed an agent twice, keeping the first");
                continue;
            }

            if !agent.requires_tools {
                step.tool_query.clear();
            } else if step.tool_query.trim().is_empty() {
                step.tool_query = query.to_string();
            }
            kept.push(step);
        }

        if kept.is_empty() {
            return Err(RouterError::PlanningFailed(
                "plan selects no known agents".to_string(),
            ));
        }

        for step in kept.iter_mut() {
            if step.depends_on.iter().any(|d| d == &step.agent) {
                return Err(RouterError::PlanningFailed(format!(
                    "agent '{}' depends on itself",
                    step.agent
                )));
            }

            let agent = step.agent.clone();
            let mut unique = HashSet::new();
            step.depends_on.retain(|dep| {
                let known = seen.contains(dep);
                if !known {
                    warn!(agent = %agent, dependency = %dep, "Dropping dependency on agent outside the plan");
                }
                known && unique.insert(dep.clone())
            });
        }

        Ok(Self {
            steps: topological_order(kept)?,
            rationale,
            fallback: false,
        })
    }

    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.agent.as_str())
    }

    pub fn step(&self, agent: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.agent == agent)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Kahn's algorithm, always taking the earliest ready step so independent
/// steps keep their planned order
fn topological_order(mut pending: Vec<PlanStep>) -> RouterResult<Vec<PlanStep>> {
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|s| s.depends_on.iter().all(|d| placed.contains(d)));

        let Some(idx) = ready else {
            let stuck: Vec<&str> = pending.iter().map(|s| s.agent.as_str()).collect();
            return Err(RouterError::PlanningFailed(format!(
                "dependency cycle among {}",
                stuck.join(", ")
            )));
        };

        let step = pending.remove(idx);
        placed.insert(step.agent.clone());
        ordered.push(step);
    }

    Ok(ordered)
}
