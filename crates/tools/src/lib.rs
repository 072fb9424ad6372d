//! Task tools for the Acontext agent.
//!
//! Each tool mutates the session's task list through the transaction of the
//! current [`IterationContext`](acontext_core::IterationContext). Tasks are
//! addressed by their 1-based order in the snapshot the loop took, messages
//! by their 0-based position in the batch being processed.

pub mod append_messages;
pub mod insert_task;
pub mod update_task;

use acontext_core::error::ToolError;
use acontext_core::tool::{Arguments, ToolRegistry};

pub use append_messages::AppendMessagesTool;
pub use insert_task::InsertTaskTool;
pub use update_task::UpdateTaskTool;

/// Create a registry with every task tool. `finish` is added by the registry
/// itself when definitions are listed.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(InsertTaskTool));
    registry.register(Box::new(UpdateTaskTool));
    registry.register(Box::new(AppendMessagesTool));
    registry
}

// --- Argument helpers ---

pub(crate) fn required_u32(arguments: &Arguments, key: &str) -> Result<u32, ToolError> {
    let value = arguments
        .get(key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}'")))?;
    as_u32(value).ok_or_else(|| {
        ToolError::InvalidArguments(format!("'{key}' must be a non-negative integer, got {value}"))
    })
}

pub(crate) fn required_str<'a>(arguments: &'a Arguments, key: &str) -> Result<&'a str, ToolError> {
    optional_str(arguments, key)?
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}'")))
}

/// A string argument that may be absent or null.
pub(crate) fn optional_str<'a>(
    arguments: &'a Arguments,
    key: &str,
) -> Result<Option<&'a str>, ToolError> {
    match arguments.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}

pub(crate) fn required_u32_list(arguments: &Arguments, key: &str) -> Result<Vec<u32>, ToolError> {
    let value = arguments
        .get(key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}'")))?;
    let items = value.as_array().ok_or_else(|| {
        ToolError::InvalidArguments(format!("'{key}' must be an array of integers, got {value}"))
    })?;
    items
        .iter()
        .map(|item| {
            as_u32(item).ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "'{key}' entries must be non-negative integers, got {item}"
                ))
            })
        })
        .collect()
}

fn as_u32(value: &serde_json::Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}
