//! Tool trait and registry.
//!
//! Tools are how the agent changes session state: every handler runs against
//! an [`IterationContext`] (one transaction, one snapshot of task and message
//! ids) and reports back through an [`Outcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::context::IterationContext;
use crate::error::Failure;
use crate::message::Role;
use crate::outcome::Outcome;
use crate::provider::ToolDefinition;

/// Reserved tool name the model calls to end the exchange. It has no handler.
pub const FINISH_TOOL: &str = "finish";

/// Parsed tool arguments.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    pub name: String,

    /// Arguments as the raw JSON string the model produced
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn is_finish(&self) -> bool {
        self.name == FINISH_TOOL
    }

    /// Parse the raw payload into a JSON object.
    pub fn parse_arguments(&self) -> Outcome<Arguments> {
        match serde_json::from_str::<serde_json::Value>(&self.arguments) {
            Ok(serde_json::Value::Object(map)) => Outcome::success(map),
            Ok(other) => Outcome::from_failure(Failure::validation(format!(
                "LLM tool arguments for {} must be a JSON object, got: {other}",
                self.name
            ))),
            Err(e) => Outcome::from_failure(Failure::validation(format!(
                "LLM tool arguments JSON decode error: {e}"
            ))),
        }
    }
}

/// The result of a tool call, fed back into the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseRecord {
    /// Always [`Role::Tool`]
    pub role: Role,

    pub tool_call_id: String,

    pub content: String,
}

impl ToolResponseRecord {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

/// The core Tool trait.
///
/// Each handler (insert_task, update_task, ...) implements this trait and is
/// registered in a [`ToolRegistry`] at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "insert_task").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool against the current dispatch pass.
    async fn execute(&self, ctx: &mut IterationContext, arguments: Arguments) -> Outcome<String>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Schema of the reserved `finish` tool: no arguments.
pub fn finish_definition() -> ToolDefinition {
    ToolDefinition {
        name: FINISH_TOOL.to_string(),
        description: "Call this when the task list is up to date and nothing else needs to change."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    }
}

/// A registry of tool handlers, keyed by name.
///
/// Definitions come out in registration order followed by `finish`, so the
/// schema sent to the model is stable between runs.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    ///
    /// The reserved `finish` name cannot carry a handler and is skipped.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if name == FINISH_TOOL {
            warn!("Refusing to register a handler for the reserved '{FINISH_TOOL}' tool");
            return;
        }
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&slot| self.tools[slot].as_ref())
    }

    /// All tool definitions for the model, `finish` included.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| t.to_definition())
            .chain(std::iter::once(finish_definition()))
            .collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
