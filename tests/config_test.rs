use conductor::agents::config::{AgentType, MergeStrategy};
use conductor::config::Settings;
use std::fs;
use tempfile::TempDir;

const CONDUCTOR_TOML: &str = r#"
[router]
shortlist_k = 4
aggregation = "summarize"

[llm]
model = "gpt-4o"
base_url = "http://localhost:8080/v1"

[cache]
dir = "/tmp/conductor-indexes"
persist = false

[[mcp_servers]]
name = "hubspot"
url = "http://localhost:3001/mcp"
max_sessions = 2

[[agents]]
name = "slack"
description = "Posts messages to Slack channels"
"#;

#[test]
fn test_load_agents_from_files() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir_all(root.join("config/agents"))?;
    fs::write(root.join("conductor.toml"), CONDUCTOR_TOML)?;

    let agent_json = r#"
{
    "name": "hubspot",
    "description": "Reads CRM contacts and deals",
    "requires_tools": true,
    "tool_provider": "hubspot",
    "agent_type": "react",
    "max_iterations": 6
}
"#;
    fs::write(root.join("config/agents/hubspot.json"), agent_json)?;

    let agent_yaml = r#"
name: zomato
description: Finds restaurants and orders food
capabilities: [food, delivery]
"#;
    fs::write(root.join("config/agents/zomato.yaml"), agent_yaml)?;

    let agent_toml = r#"
name = "github"
description = "Manages repositories and issues"
system_prompt = "You are a GitHub assistant."
"#;
    fs::write(root.join("config/agents/github.toml"), agent_toml)?;

    // Not an agent definition
    fs::write(root.join("config/agents/README.md"), "# agents")?;

    let settings = Settings::from_path(&root.join("conductor.toml"))?;

    assert_eq!(settings.router.shortlist_k, 4);
    assert_eq!(settings.router.aggregation, MergeStrategy::Summarize);
    assert_eq!(settings.llm.model, "gpt-4o");
    assert!(!settings.cache.persist);
    assert_eq!(settings.mcp_server("hubspot").unwrap().max_sessions, 2);

    let names: Vec<&str> = settings.agents.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["slack", "github", "hubspot", "zomato"]);

    let hubspot = settings.agents.iter().find(|a| a.name == "hubspot").unwrap();
    assert_eq!(hubspot.agent_type, AgentType::ReAct);
    assert_eq!(hubspot.max_iterations, 6);

    let zomato = settings.agents.iter().find(|a| a.name == "zomato").unwrap();
    assert!(zomato.capabilities.contains("delivery"));

    Ok(())
}

#[test]
fn test_missing_file_uses_defaults() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = Settings::from_path(&temp_dir.path().join("conductor.toml"))?;

    assert_eq!(settings.router.concurrency, 4);
    assert_eq!(settings.router.deadline_seconds, 120);
    assert!(settings.agents.is_empty());
    Ok(())
}

#[test]
fn test_invalid_agent_file_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir_all(root.join("config/agents"))?;

    let agent_json = r#"
{
    "name": "crm",
    "description": "Reads CRM contacts",
    "requires_tools": true,
    "tool_provider": "salesforce"
}
"#;
    fs::write(root.join("config/agents/crm.json"), agent_json)?;

    let err = Settings::from_path(&root.join("conductor.toml")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Configuration validation failed"));
    assert!(message.contains("unknown MCP server 'salesforce'"));
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::write(root.join("conductor.toml"), CONDUCTOR_TOML)?;

    std::env::set_var("CONDUCTOR__ROUTER__MAX_RETRIES", "7");
    let settings = Settings::from_path(&root.join("conductor.toml"));
    std::env::remove_var("CONDUCTOR__ROUTER__MAX_RETRIES");

    let settings = settings?;
    assert_eq!(settings.router.max_retries, 7);
    assert_eq!(settings.router.shortlist_k, 4);
    Ok(())
}
