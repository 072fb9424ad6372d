//! `insert_task`: add a pending task at a position in the list.

use acontext_core::context::IterationContext;
use acontext_core::error::Failure;
use acontext_core::outcome::Outcome;
use acontext_core::tool::{Arguments, Tool};
use async_trait::async_trait;
use tracing::debug;

use crate::{required_str, required_u32};

pub struct InsertTaskTool;

impl InsertTaskTool {
    async fn run(ctx: &mut IterationContext, arguments: &Arguments) -> Result<String, Failure> {
        let after = required_u32(arguments, "after_task_order")?;
        let description = required_str(arguments, "task_description")?.trim();
        if description.is_empty() {
            return Err(Failure::validation("'task_description' must not be empty"));
        }

        let session_id = ctx.session_id();
        let task = ctx
            .transaction()
            .insert_task(session_id, after, description)
            .await
            .into_result()?;
        debug!(task_id = %task.id, order = task.order, "Task inserted");
        Ok(format!("Task {} created: {}", task.order, task.description))
    }
}

#[async_trait]
impl Tool for InsertTaskTool {
    fn name(&self) -> &str {
        "insert_task"
    }

    fn description(&self) -> &str {
        "Create a new pending task after an existing one. Use after_task_order = 0 to put it first. Tasks after it move down by one."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "after_task_order": {
                    "type": "integer",
                    "description": "Order of the task the new one goes after, 0 for the front of the list"
                },
                "task_description": {
                    "type": "string",
                    "description": "What the task is about, one short sentence"
                }
            },
            "required": ["after_task_order", "task_description"]
        })
    }

    async fn execute(&self, ctx: &mut IterationContext, arguments: Arguments) -> Outcome<String> {
        Self::run(ctx, &arguments).await.into()
    }
}
