//! MCP Client Adapter
//!
//! Connects to external MCP servers over JSON-RPC (`tools/list`, `tools/call`)
//! and exposes them through [`ToolProviderPort`]. Each server gets a bounded
//! session pool: at most `max_sessions` requests are in flight per server, and
//! a caller that cannot get a session within `acquire_timeout_ms` fails with
//! [`ToolProviderError::SessionLimit`] instead of opening another one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, info, warn};

use crate::agents::error::ToolProviderError;
use crate::config::McpServerConfig;
use crate::domain::{ToolDescriptor, ToolProviderPort};

/// MCP JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// MCP JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Tool information from an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

impl McpTool {
    fn into_descriptor(self, server: &str) -> ToolDescriptor {
        ToolDescriptor {
            id: self.name.clone(),
            description: self
                .description
                .unwrap_or_else(|| format!("MCP tool from {}", server)),
            name: self.name,
            provider: server.to_string(),
            input_schema: self.input_schema.unwrap_or_else(|| json!({"type": "object"})),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    tools: Vec<McpTool>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

impl CallToolResult {
    /// Text content joined by newlines; parsed as JSON when possible
    fn output(self) -> Value {
        let text = self
            .content
            .into_iter()
            .filter(|item| item.content_type == "text")
            .filter_map(|item| item.text)
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
    }
}

/// Connection state for one MCP server
struct McpConnection {
    config: McpServerConfig,
    client: Client,
    sessions: Arc<Semaphore>,
    request_id: AtomicU64,
    /// Tool list from the last successful `tools/list`
    tools: RwLock<Option<Vec<ToolDescriptor>>>,
}

impl McpConnection {
    fn new(config: McpServerConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            sessions: Arc::new(Semaphore::new(config.max_sessions.max(1))),
            config,
            client,
            request_id: AtomicU64::new(0),
            tools: RwLock::new(None),
        }
    }

    fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.config.api_key {
            return Some(key.clone());
        }

        if let Some(env_var) = &self.config.api_key_env {
            return std::env::var(env_var).ok();
        }

        None
    }

    /// Wait for a free session, bounded by the acquire timeout
    async fn acquire(&self) -> Result<OwnedSemaphorePermit, ToolProviderError> {
        let wait = Duration::from_millis(self.config.acquire_timeout_ms);
        match tokio::time::timeout(wait, self.sessions.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ToolProviderError::Unavailable {
                provider: self.config.name.clone(),
                reason: "session pool closed".to_string(),
            }),
            Err(_) => {
                warn!(server = %self.config.name, limit = self.config.max_sessions, "No free MCP session");
                Err(ToolProviderError::SessionLimit {
                    provider: self.config.name.clone(),
                    limit: self.config.max_sessions,
                })
            }
        }
    }

    /// Send one JSON-RPC request; a JSON-RPC error becomes `Invocation`
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolProviderError> {
        let _permit = self.acquire().await?;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed) + 1,
            method: method.to_string(),
            params,
        };

        let mut req_builder = self.client.post(&self.config.url).json(&request);
        if let Some(api_key) = self.get_api_key() {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = format!("HTTP {}: {}", status, text);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                ToolProviderError::Transport(reason)
            } else {
                ToolProviderError::Unavailable {
                    provider: self.config.name.clone(),
                    reason,
                }
            });
        }

        let json_response: JsonRpcResponse = response.json().await?;

        if let Some(error) = json_response.error {
            return Err(ToolProviderError::Invocation {
                tool: method.to_string(),
                reason: format!("[{}] {}", error.code, error.message),
            });
        }

        json_response.result.ok_or_else(|| ToolProviderError::Unavailable {
            provider: self.config.name.clone(),
            reason: "no result in MCP response".to_string(),
        })
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
        let result = self.send_request("tools/list", None).await.map_err(|e| match e {
            ToolProviderError::Invocation { reason, .. } => ToolProviderError::Unavailable {
                provider: self.config.name.clone(),
                reason,
            },
            other => other,
        })?;

        let list: ListToolsResult = serde_json::from_value(result).map_err(|e| {
            ToolProviderError::Unavailable {
                provider: self.config.name.clone(),
                reason: format!("invalid tools/list result: {}", e),
            }
        })?;

        let tools: Vec<ToolDescriptor> = list
            .tools
            .into_iter()
            .map(|t| t.into_descriptor(&self.config.name))
            .collect();
        *self.tools.write().await = Some(tools.clone());
        Ok(tools)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
        if let Some(tools) = self.tools.read().await.as_ref() {
            return Ok(tools.clone());
        }
        self.fetch_tools().await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolProviderError> {
        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result = self
            .send_request("tools/call", Some(params))
            .await
            .map_err(|e| match e {
                ToolProviderError::Invocation { reason, .. } => ToolProviderError::Invocation {
                    tool: name.to_string(),
                    reason,
                },
                other => other,
            })?;

        let call_result: CallToolResult =
            serde_json::from_value(result).map_err(|e| ToolProviderError::Invocation {
                tool: name.to_string(),
                reason: format!("invalid tools/call result: {}", e),
            })?;

        if call_result.is_error {
            let reason = match call_result.output() {
                Value::String(text) => text,
                other => other.to_string(),
            };
            return Err(ToolProviderError::Invocation {
                tool: name.to_string(),
                reason,
            });
        }

        Ok(call_result.output())
    }
}

/// Manager for MCP client connections, one per enabled server
pub struct McpClientManager {
    connections: HashMap<String, Arc<McpConnection>>,
}

impl McpClientManager {
    pub fn new(configs: &[McpServerConfig]) -> Self {
        let mut connections = HashMap::new();
        for config in configs {
            if !config.enabled {
                info!("MCP server '{}' is disabled, skipping", config.name);
                continue;
            }
            debug!(server = %config.name, max_sessions = config.max_sessions, "Configured MCP server");
            connections.insert(config.name.clone(), Arc::new(McpConnection::new(config.clone())));
        }
        Self { connections }
    }

    /// Fetch tool lists from every server; failures are logged and retried lazily
    pub async fn initialize(&self) {
        for (name, connection) in &self.connections {
            match connection.fetch_tools().await {
                Ok(tools) => info!("Connected to MCP server '{}' with {} tools", name, tools.len()),
                Err(e) => warn!("Failed to connect to MCP server '{}': {}", name, e),
            }
        }
    }

    /// Re-fetch the tool list of one server
    pub async fn refresh_tools(&self, server_name: &str) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
        self.connection(server_name)?.fetch_tools().await
    }

    /// Get list of connected server names
    pub fn list_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.keys().cloned().collect();
        names.sort();
        names
    }

    fn connection(&self, server_name: &str) -> Result<&Arc<McpConnection>, ToolProviderError> {
        self.connections
            .get(server_name)
            .ok_or_else(|| ToolProviderError::Unavailable {
                provider: server_name.to_string(),
                reason: "not configured or disabled".to_string(),
            })
    }
}

#[async_trait]
impl ToolProviderPort for McpClientManager {
    async fn list_tools(&self, provider: &str) -> Result<Vec<ToolDescriptor>, ToolProviderError> {
        self.connection(provider)?.list_tools().await
    }

    async fn invoke(&self, provider: &str, tool_id: &str, args: Value) -> Result<Value, ToolProviderError> {
        self.connection(provider)?.call_tool(tool_id, args).await
    }
}
