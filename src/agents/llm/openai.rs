//! OpenAI-compatible chat-completions provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider, TokenUsage};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{Message, ToolCall};
use crate::agents::error::{LlmError, LlmResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI LLM Provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// The API key is read from `api_key_env` (default `OPENAI_API_KEY`). A
    /// missing key is only an error against the public endpoint; self-hosted
    /// endpoints behind `base_url` often need none.
    pub fn new(config: &LlmProviderConfig) -> LlmResult<Self> {
        let env_var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        let api_key = env::var(env_var).ok();

        if api_key.is_none() && config.base_url.is_none() {
            return Err(LlmError::Authentication(format!(
                "Environment variable {} not set",
                env_var
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the chat-completions API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": convert_messages(&request.messages),
        });

        if let Some(temp) = request.temperature.or(self.default_temperature) {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.default_max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(tools) = &request.tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools
                    .iter()
                    .map(|t| {
                        // The API requires at least {"type": "object"} for parameters
                        let mut params = t.parameters.clone();
                        if !params.is_object() {
                            params = json!({ "type": "object", "properties": {} });
                        } else if params.get("type").is_none() {
                            params["type"] = json!("object");
                        }
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": params
                            }
                        })
                    })
                    .collect::<Vec<_>>());

                if let Some(tool_choice) = &request.tool_choice {
                    body["tool_choice"] = json!(tool_choice);
                }
            }
        }

        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }

    fn parse_response(&self, response: OpenAiResponse) -> LlmResult<CompletionResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("No choices in response".to_string()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                ToolCall::new(
                    tc.id,
                    tc.function.name,
                    serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(Value::Object(Default::default())),
                )
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() && tool_calls.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(CompletionResponse {
            message: Message::assistant_with_tools(content, tool_calls),
            finish_reason: FinishReason::parse(choice.finish_reason.as_deref()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

/// Convert internal messages to the wire format
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({ "role": m.role, "content": m.content });

            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string()
                            }
                        })
                    })
                    .collect::<Vec<_>>());
            }

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            msg
        })
        .collect()
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request_body(&request);
        debug!(model = %self.model, messages = request.messages.len(), "Sending completion request");

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            http = http.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = http.json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LlmError::Authentication(error_text),
                429 => LlmError::RateLimited { retry_after_ms },
                code => LlmError::Api {
                    status: code,
                    message: error_text,
                },
            });
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        self.parse_response(parsed)
    }
}

// Chat-completions response types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::ToolDefinition;
    use crate::agents::llm::ToolChoice;

    fn provider() -> OpenAiProvider {
        let config = LlmProviderConfig {
            base_url: Some("http://localhost:1".to_string()),
            ..Default::default()
        };
        OpenAiProvider::new(&config).unwrap()
    }

    #[test]
    fn test_request_body_fills_missing_schema_type() {
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            tools: Some(vec![ToolDefinition {
                name: "search".to_string(),
                description: "Search contacts".to_string(),
                parameters: json!({ "properties": { "q": { "type": "string" } } }),
            }]),
            tool_choice: Some(ToolChoice::Auto),
            ..Default::default()
        };

        let body = provider().build_request_body(&request);
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["temperature"], json!(0.2f32));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "search", "arguments": "{\"q\":\"acme\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let parsed: OpenAiResponse = serde_json::from_value(raw).unwrap();
        let response = provider().parse_response(parsed).unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls()[0].arguments["q"], "acme");
    }

    #[test]
    fn test_empty_choice_is_error() {
        let raw = json!({ "choices": [{ "message": { "content": "  " }, "finish_reason": "stop" }] });
        let parsed: OpenAiResponse = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            provider().parse_response(parsed),
            Err(LlmError::EmptyResponse)
        ));
    }
}
