use std::collections::HashMap;
use thiserror::Error;

use crate::agents::config::{AgentConfig, RouterConfig};
use crate::config::{McpServerConfig, Settings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_router(&settings.router) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_mcp_servers(&settings.mcp_servers) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_agents(&settings.agents) {
            errors.extend(e);
        }

        // Agents must point at a configured, enabled server
        if let Err(e) = Self::validate_cross_references(settings) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_router(router: &RouterConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let positive = [
            ("router.shortlist_k", router.shortlist_k as u64),
            ("router.tool_k", router.tool_k as u64),
            ("router.concurrency", router.concurrency as u64),
            ("router.deadline_seconds", router.deadline_seconds),
            ("router.agent_timeout_seconds", router.agent_timeout_seconds),
        ];
        for (field, value) in positive {
            if value == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_mcp_servers(servers: &[McpServerConfig]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen_names = HashMap::new();

        for (idx, server) in servers.iter().enumerate() {
            if let Some(prev_idx) = seen_names.insert(&server.name, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "MCP server '{}' appears at indices {} and {}",
                    server.name, prev_idx, idx
                )));
            }

            if server.name.is_empty() {
                errors.push(ValidationError::MissingField(format!("mcp_servers[{}].name", idx)));
            }

            if server.url.is_empty() {
                errors.push(ValidationError::MissingField(format!("mcp_servers[{}].url", idx)));
            }

            if server.max_sessions == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("mcp_servers[{}].max_sessions", idx),
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_agents(agents: &[AgentConfig]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen_names = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if let Some(prev_idx) = seen_names.insert(&agent.name, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Agent '{}' appears at indices {} and {}",
                    agent.name, prev_idx, idx
                )));
            }

            if agent.name.trim().is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].name", idx)));
            }

            if agent.description.trim().is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].description", idx)));
            }

            if agent.requires_tools && agent.tool_provider.is_none() {
                errors.push(ValidationError::MissingField(format!(
                    "agents[{}].tool_provider (required when requires_tools = true)",
                    idx
                )));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_cross_references(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for agent in &settings.agents {
            let Some(provider) = &agent.tool_provider else {
                continue;
            };
            match settings.mcp_servers.iter().find(|s| &s.name == provider) {
                None => errors.push(ValidationError::CrossReference(format!(
                    "Agent '{}' references unknown MCP server '{}'",
                    agent.name, provider
                ))),
                Some(server) if !server.enabled => errors.push(ValidationError::CrossReference(format!(
                    "Agent '{}' references disabled MCP server '{}'",
                    agent.name, provider
                ))),
                Some(_) => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
