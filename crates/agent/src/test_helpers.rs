//! Shared test helpers for the dispatcher and loop tests.

use acontext_core::context::IterationContext;
use acontext_core::error::ErrorKind;
use acontext_core::outcome::Outcome;
use acontext_core::provider::{CompletionRequest, CompletionResponse, Provider};
use acontext_core::tool::{Arguments, Tool, ToolCallRequest};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A provider that plays back scripted outcomes.
///
/// Once the script runs out the last entry repeats, so "always answer with
/// this" is a one-entry script.
pub struct ScriptedProvider {
    script: Vec<Outcome<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Outcome<CompletionResponse>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one response");
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Outcome<CompletionResponse> {
        let mut requests = self.requests.lock().unwrap();
        let slot = requests.len().min(self.script.len() - 1);
        requests.push(request);
        self.script[slot].clone()
    }
}

/// A plain-text response with no tool calls.
pub fn text_response(text: &str) -> Outcome<CompletionResponse> {
    Outcome::success(CompletionResponse {
        content: text.into(),
        model: "mock-model".into(),
        ..CompletionResponse::default()
    })
}

/// A response carrying the given `(name, raw arguments)` calls.
pub fn calls_response(calls: &[(&str, &str)]) -> Outcome<CompletionResponse> {
    Outcome::success(CompletionResponse {
        content: String::new(),
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCallRequest::new(format!("call_{i}"), *name, *args))
            .collect(),
        usage: None,
        model: "mock-model".into(),
    })
}

/// Records every argument map it is called with and answers "logged".
#[derive(Clone, Default)]
pub struct LogTool {
    pub calls: Arc<Mutex<Vec<Arguments>>>,
}

impl LogTool {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Tool for LogTool {
    fn name(&self) -> &str {
        "log"
    }
    fn description(&self) -> &str {
        "Record the arguments"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _ctx: &mut IterationContext, arguments: Arguments) -> Outcome<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(arguments);
        Outcome::success(format!("logged #{}", calls.len()))
    }
}

/// Always fails with a ToolExecutionError.
pub struct FailTool;

#[async_trait]
impl Tool for FailTool {
    fn name(&self) -> &str {
        "fail"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _ctx: &mut IterationContext, _arguments: Arguments) -> Outcome<String> {
        Outcome::failure(ErrorKind::ToolExecution, "disk full")
    }
}

/// Panics when executed.
pub struct PanicTool;

#[async_trait]
impl Tool for PanicTool {
    fn name(&self) -> &str {
        "explode"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _ctx: &mut IterationContext, _arguments: Arguments) -> Outcome<String> {
        panic!("index out of bounds");
    }
}
