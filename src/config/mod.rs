use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub mod validator;

use crate::agents::config::{AgentConfig, EmbeddingConfig, LlmProviderConfig, RouterConfig};
use crate::cli::Cli;

/// Prefix for environment overrides, e.g. `CONDUCTOR__ROUTER__CONCURRENCY=8`
pub const ENV_PREFIX: &str = "CONDUCTOR";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub llm: LlmProviderConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// External MCP servers supplying tools to agents
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

/// Where built semantic indexes are kept between runs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Write built indexes to `dir` and reuse them on startup
    #[serde(default = "default_enabled")]
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            persist: true,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache/indexes")
}

/// Configuration for connecting to an external MCP server
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct McpServerConfig {
    /// Unique name, referenced by `tool_provider` on agents
    pub name: String,
    /// URL of the MCP server (e.g., "http://localhost:3001/mcp")
    pub url: String,
    /// Optional API key for authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable containing the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Whether this server is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Request timeout in seconds
    #[serde(default = "default_mcp_timeout")]
    pub timeout_seconds: u64,
    /// Maximum concurrent sessions against this server
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// How long a caller waits for a free session before failing
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_mcp_timeout() -> u64 {
    30
}

fn default_max_sessions() -> usize {
    4
}

fn default_acquire_timeout() -> u64 {
    2000
}

impl Settings {
    /// Load settings the way the binary does: file, environment, CLI overrides,
    /// agent definition files, then validation
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::read(&cli.config)?;
        settings.apply_cli_overrides(cli);
        settings.load_external_configs(config_root(&cli.config))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a config file path without CLI overrides
    pub fn from_path(config_path: &Path) -> Result<Self, anyhow::Error> {
        let mut settings = Self::read(config_path)?;
        settings.load_external_configs(config_root(config_path))?;
        settings.validate()?;
        Ok(settings)
    }

    fn read(config_path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Apply CLI argument overrides to settings (CLI > env vars > config file)
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(deadline) = cli.deadline {
            self.router.deadline_seconds = deadline;
        }
        if let Some(concurrency) = cli.concurrency {
            self.router.concurrency = concurrency;
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    fn load_external_configs(&mut self, root: &Path) -> Result<(), anyhow::Error> {
        self.load_agents_from_dir(&root.join("config").join("agents"))
    }

    /// Append agent definitions from `*.json`, `*.yaml`, `*.yml` and `*.toml` files, sorted by path
    fn load_agents_from_dir(&mut self, path: &Path) -> Result<(), anyhow::Error> {
        let pattern = format!("{}/*", path.display());
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => {
                    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                        if matches!(ext, "json" | "yaml" | "yml" | "toml") {
                            let content = std::fs::read_to_string(&path)?;
                            let agent: AgentConfig = match ext {
                                "json" => serde_json::from_str(&content)?,
                                "toml" => toml::from_str(&content)?,
                                _ => serde_yaml::from_str(&content)?,
                            };
                            tracing::debug!(agent = %agent.name, path = %path.display(), "Loaded agent definition");
                            self.agents.push(agent);
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
            }
        }
        Ok(())
    }

    /// Look up an enabled MCP server by name
    pub fn mcp_server(&self, name: &str) -> Option<&McpServerConfig> {
        self.mcp_servers.iter().find(|s| s.name == name && s.enabled)
    }
}

fn config_root(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
