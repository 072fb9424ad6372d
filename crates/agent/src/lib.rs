//! The Acontext task agent.
//!
//! The agent reads a batch of new messages and keeps the session's task list
//! in step with them:
//!
//! 1. **Fetch** the current tasks of the session
//! 2. **Render** tasks, earlier messages and the new batch into a prompt
//! 3. **Complete** against the configured provider with the task tools
//! 4. **Dispatch** the requested tool calls in one store transaction
//! 5. Repeat from 3 until the model calls `finish`, stops calling tools,
//!    or the iteration cap is reached
//!
//! Every step reports through an [`Outcome`](acontext_core::Outcome); the
//! first failure is what the caller gets back.

pub mod dispatch;
pub mod instrument;
pub mod loop_runner;
pub mod prompt;

#[cfg(test)]
mod test_helpers;

pub use dispatch::{DispatchReport, Dispatcher};
pub use instrument::track_process;
pub use loop_runner::{DEFAULT_MAX_ITERATIONS, TaskAgent};
pub use prompt::{
    TASK_PROMPT_ID, TaskPrompt, pack_current_message_with_ids, pack_previous_messages_section,
    pack_task_section,
};
