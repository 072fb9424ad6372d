//! Provider trait: the abstraction over completion services.
//!
//! A Provider takes a prompt, a system prompt and a tool schema, and returns
//! the assistant's text plus any tool calls it wants made. Every upstream
//! problem comes back as a failed [`Outcome`] of kind `UpstreamError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;
use crate::tool::ToolCallRequest;

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The user-turn prompt text
    pub prompt: String,

    pub system_prompt: String,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Free-form per-call options (prompt id, sampling overrides)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The assistant's reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,

    /// Tool calls in the order the model emitted them
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The completion service seen from the agent loop.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get the complete response.
    async fn complete(&self, request: CompletionRequest) -> Outcome<CompletionResponse>;
}
