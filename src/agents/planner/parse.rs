//! Lenient decoding of planner responses

use serde::Deserialize;
use std::collections::HashMap;

use super::PlanStep;
use crate::agents::error::{RouterError, RouterResult};

/// Steps and rationale decoded from a model response, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlan {
    pub steps: Vec<PlanStep>,
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default, alias = "servers", alias = "selected_agents")]
    agents: Vec<RawAgent>,
    #[serde(default)]
    tool_queries: HashMap<String, String>,
    #[serde(default, alias = "dependencies")]
    depends_on: HashMap<String, Vec<String>>,
    #[serde(default, alias = "reasoning")]
    rationale: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAgent {
    Name(String),
    Step {
        #[serde(alias = "agent")]
        name: String,
        #[serde(default, alias = "query")]
        tool_query: Option<String>,
        #[serde(default, alias = "dependsOn")]
        depends_on: Vec<String>,
    },
}

/// Strip a surrounding Markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (```json) up to the end of the first line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Decode a planner response.
///
/// Accepts fenced or bare JSON, prose around a single JSON object, the
/// list-of-names shape with a `tool_queries` map and the list-of-steps shape.
pub fn parse_plan(text: &str) -> RouterResult<RawPlan> {
    let body = strip_code_fence(text);

    let response: RawResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(first) => {
            let object = match (body.find('{'), body.rfind('}')) {
                (Some(start), Some(end)) if start < end => &body[start..=end],
                _ => {
                    return Err(RouterError::PlanningFailed(format!(
                        "response is not JSON: {}",
                        first
                    )))
                }
            };
            serde_json::from_str(object).map_err(|e| {
                RouterError::PlanningFailed(format!("response is not a plan: {}", e))
            })?
        }
    };

    let RawResponse {
        agents,
        mut tool_queries,
        mut depends_on,
        rationale,
    } = response;

    let steps = agents
        .into_iter()
        .map(|raw| {
            let (name, query, mut deps) = match raw {
                RawAgent::Name(name) => (name, None, Vec::new()),
                RawAgent::Step {
                    name,
                    tool_query,
                    depends_on,
                } => (name, tool_query, depends_on),
            };
            let name = name.trim().to_string();

            if let Some(extra) = depends_on.remove(&name) {
                deps.extend(extra);
            }

            PlanStep {
                tool_query: query
                    .or_else(|| tool_queries.remove(&name))
                    .unwrap_or_default(),
                depends_on: deps,
                agent: name,
            }
        })
        .collect();

    Ok(RawPlan { steps, rationale })
}
