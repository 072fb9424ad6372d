//! Prompt assembly for the task agent.
//!
//! Pure text building: every function here takes already-loaded tasks and
//! messages and returns a string. No I/O, no mutation, same input gives the
//! same output.

use acontext_core::message::Message;
use acontext_core::provider::ToolDefinition;
use acontext_core::task::Task;
use acontext_core::tool::ToolRegistry;

/// Identifier sent with every completion so logs can tell prompts apart.
pub const TASK_PROMPT_ID: &str = "agent.task";

/// One `- Task ...` line per task, in the order given.
pub fn pack_task_section(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|t| format!("- {}", t.render()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One rendered line per earlier message, in the order given.
pub fn pack_previous_messages_section(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The batch being processed, each line tagged with its 0-based position.
///
/// The position is what `append_messages_to_task` takes as a message id.
pub fn pack_current_message_with_ids(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("<message id={i}> {} </message>", m.render()))
        .collect::<Vec<_>>()
        .join("\n")
}

const SYSTEM_PROMPT: &str = "\
You are a task manager that keeps a session's task list in sync with the conversation.

You are given the current task list, earlier messages for context, and the newest messages. \
Each newest message is wrapped in <message id=N> tags; N is the id you pass to tools.

Work through the newest messages and:
- insert a task when the user asks for something new or the assistant plans a new step
- update a task's status when the conversation shows it started, succeeded or failed
- update a task's description when its scope changed
- attach each newest message to the task it is about

Only change what the messages support. Keep descriptions short and concrete. \
Task orders refer to the task list exactly as shown to you. \
When the list is up to date, call `finish`.";

/// The fixed prompt set of the task agent.
pub struct TaskPrompt;

impl TaskPrompt {
    pub fn system_prompt() -> &'static str {
        SYSTEM_PROMPT
    }

    /// Fill the user-turn template with the three sections.
    pub fn pack_task_input(
        previous_messages: &str,
        current_messages: &str,
        current_tasks: &str,
    ) -> String {
        format!(
            "## Current Existing Tasks:\n{}\n\n## Previous Messages:\n{}\n\n## Current Message with IDs:\n{}\n\nPlease analyze the above information and determine the actions.",
            or_none(current_tasks),
            or_none(previous_messages),
            or_none(current_messages),
        )
    }

    /// Per-call options for the completion client.
    pub fn prompt_kwargs() -> serde_json::Map<String, serde_json::Value> {
        let mut options = serde_json::Map::new();
        options.insert("prompt_id".into(), TASK_PROMPT_ID.into());
        options
    }

    /// Every registered tool plus `finish`.
    pub fn tool_schema(registry: &ToolRegistry) -> Vec<ToolDefinition> {
        registry.definitions()
    }
}

fn or_none(section: &str) -> &str {
    if section.is_empty() { "(none)" } else { section }
}
