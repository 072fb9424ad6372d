//! `update_task`: change the status and/or description of a task.

use acontext_core::context::IterationContext;
use acontext_core::error::Failure;
use acontext_core::outcome::Outcome;
use acontext_core::store::TaskUpdate;
use acontext_core::task::TaskStatus;
use acontext_core::tool::{Arguments, Tool};
use async_trait::async_trait;
use std::str::FromStr;

use crate::{optional_str, required_u32};

pub struct UpdateTaskTool;

impl UpdateTaskTool {
    async fn run(ctx: &mut IterationContext, arguments: &Arguments) -> Result<String, Failure> {
        let order = required_u32(arguments, "task_order")?;
        let status = optional_str(arguments, "task_status")?
            .map(TaskStatus::from_str)
            .transpose()
            .map_err(Failure::validation)?;
        let description = optional_str(arguments, "task_description")?.map(str::to_string);

        let update = TaskUpdate {
            status,
            description,
        };
        if update.is_empty() {
            return Err(Failure::validation(
                "update_task needs 'task_status' or 'task_description'",
            ));
        }

        let task_id = ctx.task_id_at(order).into_result()?;
        let task = ctx
            .transaction()
            .update_task(task_id, update)
            .await
            .into_result()?;
        Ok(format!("Task {order} updated: {}", task.render()))
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update the status and/or description of an existing task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_order": {
                    "type": "integer",
                    "description": "Order of the task to update, as shown in the task list"
                },
                "task_status": {
                    "type": "string",
                    "enum": ["pending", "running", "success", "failed"],
                    "description": "New status of the task"
                },
                "task_description": {
                    "type": "string",
                    "description": "New description of the task"
                }
            },
            "required": ["task_order"]
        })
    }

    async fn execute(&self, ctx: &mut IterationContext, arguments: Arguments) -> Outcome<String> {
        Self::run(ctx, &arguments).await.into()
    }
}
