//! OpenAI-compatible completion provider.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint that speaks
//! `/chat/completions` with function calling. One request per call, no
//! streaming.

use acontext_core::error::ProviderError;
use acontext_core::outcome::Outcome;
use acontext_core::provider::{
    CompletionRequest, CompletionResponse, Provider, ToolDefinition, Usage,
};
use acontext_core::tool::ToolCallRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fallback wait when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Build the JSON body for one request.
    ///
    /// `prompt_id` only labels the call in logs; every other option key is
    /// copied into the body and may override the model or temperature.
    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages = vec![
            ApiMessage {
                role: "system".into(),
                content: Some(request.system_prompt.clone()),
                tool_calls: None,
            },
            ApiMessage {
                role: "user".into(),
                content: Some(request.prompt.clone()),
                tool_calls: None,
            },
        ];

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": false,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        for (key, value) in &request.options {
            if key != "prompt_id" {
                body[key] = value.clone();
            }
        }

        body
    }

    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request);
        let prompt_id = request
            .options
            .get("prompt_id")
            .and_then(|v| v.as_str())
            .unwrap_or("-");

        debug!(
            provider = %self.name,
            model = %self.model,
            prompt_id,
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        parse_response(&raw)
    }
}

/// Turn a `/chat/completions` response body into a [`CompletionResponse`].
fn parse_response(raw: &str) -> Result<CompletionResponse, ProviderError> {
    let api_response: ApiResponse = serde_json::from_str(raw)
        .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallRequest::new(tc.id, tc.function.name, tc.function.arguments))
        .collect();

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        usage,
        model: api_response.model,
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Outcome<CompletionResponse> {
        self.send(request).await.into()
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use acontext_core::error::ErrorKind;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("openai", "https://api.openai.com/v1/", "sk-test", "gpt-4.1", 0.2)
            .unwrap()
    }

    fn request() -> CompletionRequest {
        let mut options = serde_json::Map::new();
        options.insert("prompt_id".into(), "agent.task".into());
        options.insert("max_tokens".into(), 512.into());
        CompletionRequest {
            prompt: "current tasks...".into(),
            system_prompt: "You are a task manager.".into(),
            tools: vec![ToolDefinition {
                name: "finish".into(),
                description: "done".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
            options,
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(provider().base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn body_has_system_then_user_message() {
        let body = provider().build_body(&request());
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "current tasks...");
    }

    #[test]
    fn tools_use_function_format() {
        let body = provider().build_body(&request());
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "finish");
    }

    #[test]
    fn options_pass_through_except_prompt_id() {
        let body = provider().build_body(&request());
        assert_eq!(body["max_tokens"], 512);
        assert!(body.get("prompt_id").is_none());
    }

    #[test]
    fn parse_response_with_tool_calls() {
        let raw = r#"{
            "model": "gpt-4.1-2025-04-14",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "insert_task", "arguments": "{\"after_task_order\":0}"}},
                        {"id": "call_2", "type": "function",
                         "function": {"name": "finish", "arguments": "{}"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response = parse_response(raw).unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].name, "insert_task");
        assert!(response.tool_calls[1].is_finish());
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_response_plain_text() {
        let raw = r#"{"model": "m", "choices": [{"message": {"role": "assistant", "content": "nothing to do"}}]}"#;
        let response = parse_response(raw).unwrap();
        assert_eq!(response.content, "nothing to do");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = parse_response(r#"{"model": "m", "choices": []}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn garbage_body_surfaces_as_upstream_failure() {
        let outcome: Outcome<CompletionResponse> = parse_response("<html>").into();
        assert_eq!(outcome.error().unwrap().kind, ErrorKind::Upstream);
    }
}
