//! Error types for the routing core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the selection-and-orchestration pipeline
#[derive(Debug, Error)]
pub enum RouterError {
    /// Embedding provider failed or timed out
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    /// Language model failed or returned an unusable plan
    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    /// Tool provider could not be reached
    #[error("Tool provider unavailable: {0}")]
    ToolProviderUnavailable(ToolProviderError),

    /// A tool call was rejected or failed on the provider side
    #[error("Tool invocation failed: {0}")]
    ToolInvocationFailed(ToolProviderError),

    /// Agent execution failed
    #[error("Agent execution failed: {0}")]
    AgentExecutionFailed(String),

    /// An upstream agent did not succeed
    #[error("Dependency '{0}' did not complete successfully")]
    DependencyFailed(String),

    /// Run-level deadline expired
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Nothing in the catalog could be selected
    #[error("No agents available to select from")]
    NoAgentsAvailable,

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Per-invocation timeout
    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    /// Index cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RouterError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RouterError::EmbeddingUnavailable(e) => e.is_transient(),
            RouterError::ToolProviderUnavailable(e) | RouterError::ToolInvocationFailed(e) => {
                e.is_transient()
            }
            RouterError::Llm(e) => e.is_transient(),
            RouterError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Taxonomy bucket recorded in run results
    pub fn kind(&self) -> FailureKind {
        match self {
            RouterError::EmbeddingUnavailable(_) => FailureKind::EmbeddingUnavailable,
            RouterError::PlanningFailed(_) => FailureKind::PlanningFailed,
            RouterError::ToolProviderUnavailable(_) => FailureKind::ToolProviderUnavailable,
            RouterError::ToolInvocationFailed(_) => FailureKind::ToolInvocationFailed,
            RouterError::DependencyFailed(_) => FailureKind::DependencyFailed,
            RouterError::DeadlineExceeded => FailureKind::DeadlineExceeded,
            _ => FailureKind::AgentExecutionFailed,
        }
    }
}

impl From<ToolProviderError> for RouterError {
    fn from(err: ToolProviderError) -> Self {
        match err {
            ToolProviderError::Invocation { .. } => RouterError::ToolInvocationFailed(err),
            _ => RouterError::ToolProviderUnavailable(err),
        }
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        RouterError::Cache(format!("IO error: {}", err))
    }
}

/// Failure taxonomy attached to per-agent outcomes and run-level degradations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmbeddingUnavailable,
    PlanningFailed,
    ToolProviderUnavailable,
    ToolInvocationFailed,
    AgentExecutionFailed,
    DependencyFailed,
    DeadlineExceeded,
    /// The answer could not be summarised and was concatenated instead
    AggregationFailed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::EmbeddingUnavailable => "EmbeddingUnavailable",
            FailureKind::PlanningFailed => "PlanningFailed",
            FailureKind::ToolProviderUnavailable => "ToolProviderUnavailable",
            FailureKind::ToolInvocationFailed => "ToolInvocationFailed",
            FailureKind::AgentExecutionFailed => "AgentExecutionFailed",
            FailureKind::DependencyFailed => "DependencyFailed",
            FailureKind::DeadlineExceeded => "DeadlineExceeded",
            FailureKind::AggregationFailed => "AggregationFailed",
        };
        f.write_str(name)
    }
}

/// Errors specific to the embedding provider
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Provider unreachable or returned an error
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// Request timed out
    #[error("embedding request timed out")]
    Timeout,

    /// Response could not be interpreted
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

impl EmbeddingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Unavailable(_) | EmbeddingError::Timeout)
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout
        } else if err.is_decode() {
            EmbeddingError::InvalidResponse(err.to_string())
        } else {
            EmbeddingError::Unavailable(err.to_string())
        }
    }
}

/// Errors specific to LLM provider operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Empty completion
    #[error("Empty response from model")]
    EmptyResponse,

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Errors raised by the MCP session manager collaborator
#[derive(Debug, Clone, Error)]
pub enum ToolProviderError {
    /// Provider unknown, disabled or unreachable
    #[error("provider '{provider}' unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// All sessions for the provider are busy past the acquire timeout
    #[error("provider '{provider}' has no free session (limit {limit})")]
    SessionLimit { provider: String, limit: usize },

    /// The provider rejected or failed the tool call
    #[error("tool '{tool}' failed: {reason}")]
    Invocation { tool: String, reason: String },

    /// Transport-level failure talking to the provider
    #[error("transport error: {0}")]
    Transport(String),

    /// Request timed out
    #[error("request timed out")]
    Timeout,
}

impl ToolProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ToolProviderError::Transport(_)
                | ToolProviderError::Timeout
                | ToolProviderError::SessionLimit { .. }
        )
    }
}

impl From<reqwest::Error> for ToolProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ToolProviderError::Timeout
        } else {
            ToolProviderError::Transport(err.to_string())
        }
    }
}

/// Result type alias for routing operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RouterError::Llm(LlmError::Timeout).is_transient());
        assert!(RouterError::Llm(LlmError::Api { status: 503, message: "busy".into() }).is_transient());
        assert!(!RouterError::Llm(LlmError::Api { status: 400, message: "bad".into() }).is_transient());
        assert!(!RouterError::AgentExecutionFailed("boom".into()).is_transient());
        assert!(RouterError::from(ToolProviderError::Transport("reset".into())).is_transient());
    }

    #[test]
    fn test_tool_errors_map_to_taxonomy() {
        let invocation = RouterError::from(ToolProviderError::Invocation {
            tool: "send".into(),
            reason: "bad args".into(),
        });
        assert_eq!(invocation.kind(), FailureKind::ToolInvocationFailed);
        assert!(!invocation.is_transient());

        let unavailable = RouterError::from(ToolProviderError::Unavailable {
            provider: "slack".into(),
            reason: "down".into(),
        });
        assert_eq!(unavailable.kind(), FailureKind::ToolProviderUnavailable);
    }

    #[test]
    fn test_llm_errors_count_as_execution_failures() {
        assert_eq!(
            RouterError::Llm(LlmError::EmptyResponse).kind(),
            FailureKind::AgentExecutionFailed
        );
        assert_eq!(FailureKind::DependencyFailed.to_string(), "DependencyFailed");
    }
}
