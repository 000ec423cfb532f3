//! Tool call types for agent interactions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ToolDescriptor;

/// A tool call requested by the language model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier echoed back in the tool result message
    pub id: String,
    /// Tool id as advertised to the model
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Generate a unique ID for a tool call
    pub fn generate_id() -> String {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        format!("call_{}", &raw[..24])
    }
}

/// Record of one tool invocation made by an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub output: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ToolInvocation {
    pub fn success(tool: &str, arguments: Value, output: Value, execution_time_ms: u64) -> Self {
        Self {
            tool: tool.to_string(),
            arguments,
            output,
            success: true,
            error: None,
            execution_time_ms,
        }
    }

    pub fn failure(tool: &str, arguments: Value, error: String, execution_time_ms: u64) -> Self {
        Self {
            tool: tool.to_string(),
            arguments,
            output: Value::Null,
            success: false,
            error: Some(error),
            execution_time_ms,
        }
    }
}

/// Tool schema advertised to the language model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema defining the tool's parameters
    pub parameters: Value,
}

impl From<&ToolDescriptor> for ToolDefinition {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            name: tool.id.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        }
    }
}
