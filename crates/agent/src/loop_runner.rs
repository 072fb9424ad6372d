//! The task agent loop.
//!
//! One call to [`TaskAgent::orchestrate`] runs a bounded exchange with the
//! completion service:
//!
//! 1. **Fetch** the session's tasks (plain read, no transaction)
//! 2. **Prompt**: render the task, history and current-batch sections
//! 3. **Complete**: send them with the tool schema
//! 4. **Dispatch** the returned tool calls inside a fresh [`IterationContext`]
//! 5. Stop on `finish`, on a reply without tool calls, or at the cap;
//!    otherwise go back to 3
//!
//! Any failure along the way ends the call and is returned unchanged.

use acontext_core::context::IterationContext;
use acontext_core::error::Failure;
use acontext_core::message::Message;
use acontext_core::outcome::Outcome;
use acontext_core::provider::{CompletionRequest, Provider, ToolDefinition};
use acontext_core::store::SessionStore;
use acontext_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::prompt::{
    TaskPrompt, pack_current_message_with_ids, pack_previous_messages_section, pack_task_section,
};

/// Completion rounds per call unless the caller asks otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// How one round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// The model answered without tool calls
    NoToolCalls,
    /// `finish` was among the tool calls
    Finished,
    /// Tools ran; ask again unless the cap is reached
    Continue,
}

/// Everything a round needs that stays fixed for the whole call.
struct Round<'a> {
    session_id: Uuid,
    prompt: &'a str,
    tools: &'a [ToolDefinition],
    task_ids: &'a Arc<[Uuid]>,
    message_ids: &'a Arc<[Uuid]>,
}

/// Drives the task agent for one session at a time.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
pub struct TaskAgent {
    provider: Arc<dyn Provider>,
    store: Arc<dyn SessionStore>,
    dispatcher: Dispatcher,
}

impl TaskAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn SessionStore>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            store,
            dispatcher: Dispatcher::new(tools),
        }
    }

    /// Run the loop for `session_id`.
    ///
    /// `previous_messages` are shown as context only; `messages` is the batch
    /// being processed, addressable by position from the tools.
    /// `max_iterations` must be at least 1.
    pub async fn orchestrate(
        &self,
        session_id: Uuid,
        previous_messages: &[Message],
        messages: &[Message],
        max_iterations: u32,
    ) -> Outcome<()> {
        let span = info_span!("task_agent", %session_id);
        self.run(session_id, previous_messages, messages, max_iterations)
            .instrument(span)
            .await
            .into()
    }

    async fn run(
        &self,
        session_id: Uuid,
        previous_messages: &[Message],
        messages: &[Message],
        max_iterations: u32,
    ) -> Result<(), Failure> {
        if max_iterations == 0 {
            return Err(Failure::validation("max_iterations must be at least 1"));
        }

        let tasks = self
            .store
            .fetch_current_tasks(session_id)
            .await
            .into_result()?;

        debug!(
            tasks = tasks.len(),
            tools = ?self.dispatcher.registry().names(),
            "Loaded session state"
        );

        let task_section = pack_task_section(&tasks);
        let previous_section = pack_previous_messages_section(previous_messages);
        let current_section = pack_current_message_with_ids(messages);
        info!("Task Section: {task_section}");
        info!("Previous Messages Section: {previous_section}");
        info!("Current Messages Section: {current_section}");

        let task_ids: Arc<[Uuid]> = tasks.iter().map(|t| t.id).collect();
        let message_ids: Arc<[Uuid]> = messages.iter().map(|m| m.id).collect();
        let prompt = TaskPrompt::pack_task_input(&previous_section, &current_section, &task_section);
        let tools = TaskPrompt::tool_schema(self.dispatcher.registry());

        let round = Round {
            session_id,
            prompt: &prompt,
            tools: &tools,
            task_ids: &task_ids,
            message_ids: &message_ids,
        };

        for iteration in 1..=max_iterations {
            let step = self
                .round(&round)
                .instrument(info_span!("iteration", iteration))
                .await?;
            match step {
                Step::NoToolCalls => {
                    info!("No tool calls found, stop iterations");
                    break;
                }
                Step::Finished => {
                    info!("finish called, stop iterations");
                    break;
                }
                Step::Continue if iteration == max_iterations => {
                    info!(max_iterations, "Iteration cap reached");
                }
                Step::Continue => {}
            }
        }

        Ok(())
    }

    /// One completion and, if it asks for tools, one dispatch pass.
    async fn round(&self, round: &Round<'_>) -> Result<Step, Failure> {
        let request = CompletionRequest {
            prompt: round.prompt.to_string(),
            system_prompt: TaskPrompt::system_prompt().to_string(),
            tools: round.tools.to_vec(),
            options: TaskPrompt::prompt_kwargs(),
        };
        let response = self.provider.complete(request).await.into_result()?;
        info!(
            tool_calls = response.tool_calls.len(),
            "LLM Response: {}", response.content
        );

        if response.tool_calls.is_empty() {
            return Ok(Step::NoToolCalls);
        }

        let mut ctx = IterationContext::open(
            self.store.as_ref(),
            round.session_id,
            round.task_ids.clone(),
            round.message_ids.clone(),
        )
        .await
        .into_result()?;

        let dispatched = self.dispatcher.dispatch(&mut ctx, &response.tool_calls).await;
        let released = ctx.release().await;
        let report = dispatched.into_result()?;
        released.into_result()?;

        debug!(responses = report.responses.len(), "Dispatch pass complete");
        Ok(if report.finished {
            Step::Finished
        } else {
            Step::Continue
        })
    }
}
