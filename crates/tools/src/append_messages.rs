//! `append_messages_to_task`: attach messages of the current batch to a task.

use acontext_core::context::IterationContext;
use acontext_core::error::Failure;
use acontext_core::outcome::Outcome;
use acontext_core::tool::{Arguments, Tool};
use async_trait::async_trait;

use crate::{required_u32, required_u32_list};

pub struct AppendMessagesTool;

impl AppendMessagesTool {
    async fn run(ctx: &mut IterationContext, arguments: &Arguments) -> Result<String, Failure> {
        let order = required_u32(arguments, "task_order")?;
        let positions = required_u32_list(arguments, "message_ids")?;
        if positions.is_empty() {
            return Err(Failure::validation("'message_ids' must not be empty"));
        }

        let task_id = ctx.task_id_at(order).into_result()?;
        let message_ids = positions
            .iter()
            .map(|&i| ctx.message_id_at(i as usize).into_result())
            .collect::<Result<Vec<_>, _>>()?;

        let attached = ctx
            .transaction()
            .attach_messages(task_id, &message_ids)
            .await
            .into_result()?;
        Ok(format!("{attached} message(s) attached to Task {order}"))
    }
}

#[async_trait]
impl Tool for AppendMessagesTool {
    fn name(&self) -> &str {
        "append_messages_to_task"
    }

    fn description(&self) -> &str {
        "Link messages from the current batch to the task they belong to. Message ids are the ids shown in <message id=...> tags."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_order": {
                    "type": "integer",
                    "description": "Order of the task the messages belong to"
                },
                "message_ids": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Ids of the current messages to attach"
                }
            },
            "required": ["task_order", "message_ids"]
        })
    }

    async fn execute(&self, ctx: &mut IterationContext, arguments: Arguments) -> Outcome<String> {
        Self::run(ctx, &arguments).await.into()
    }
}
