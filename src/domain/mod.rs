//! Ports for the external collaborators the routing core consumes.
//!
//! Transport, process lifecycle and persistence of these collaborators are
//! owned by their implementations; the core only relies on these contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::error::{EmbeddingError, ToolProviderError};

/// A callable capability exposed by a tool provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Identifier the provider expects on invoke
    pub id: String,
    pub name: String,
    pub description: String,
    /// Provider this tool belongs to
    pub provider: String,
    /// JSON Schema of the tool arguments
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

fn default_input_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            description: description.into(),
            provider: provider.into(),
            input_schema: default_input_schema(),
        }
    }

    /// Text used when indexing this tool for retrieval
    pub fn index_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// Converts text to a fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier; vectors from different models are never mixed
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Live tool-provider sessions (the MCP session manager)
#[async_trait]
pub trait ToolProviderPort: Send + Sync {
    /// Every tool the provider currently exposes
    async fn list_tools(&self, provider: &str) -> Result<Vec<ToolDescriptor>, ToolProviderError>;

    /// Call one tool on the provider
    async fn invoke(
        &self,
        provider: &str,
        tool_id: &str,
        args: Value,
    ) -> Result<Value, ToolProviderError>;
}
