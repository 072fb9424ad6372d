//! Tool dispatch: run one batch of tool-call requests against a context.
//!
//! Requests run strictly in the order the model emitted them. The first
//! failure ends the batch and is returned as is; records collected before it
//! are discarded. Writes already made through the context's transaction are
//! not undone here.

use acontext_core::context::IterationContext;
use acontext_core::error::{Failure, ToolError};
use acontext_core::outcome::Outcome;
use acontext_core::tool::{Arguments, Tool, ToolCallRequest, ToolRegistry, ToolResponseRecord};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};

/// What a successful pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// One record per executed request, in request order
    pub responses: Vec<ToolResponseRecord>,

    /// Whether `finish` appeared anywhere in the batch
    pub finished: bool,
}

/// Resolves tool-call requests against a registry and runs them.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        ctx: &mut IterationContext,
        calls: &[ToolCallRequest],
    ) -> Outcome<DispatchReport> {
        self.run(ctx, calls).await.into()
    }

    async fn run(
        &self,
        ctx: &mut IterationContext,
        calls: &[ToolCallRequest],
    ) -> Result<DispatchReport, Failure> {
        let mut report = DispatchReport::default();

        for call in calls {
            if call.is_finish() {
                info!("finish tool called");
                report.finished = true;
                continue;
            }

            let arguments = call.parse_arguments().into_result()?;
            let tool = self
                .registry
                .get(&call.name)
                .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

            let span = info_span!("tool", tool = %call.name, call_id = %call.id);
            let content = async {
                info!(arguments = %serde_json::Value::Object(arguments.clone()), "Tool call");
                let content = invoke(tool, ctx, arguments).await?;
                info!(response = %content, "Tool response");
                Ok::<_, Failure>(content)
            }
            .instrument(span)
            .await?;

            report
                .responses
                .push(ToolResponseRecord::new(call.id.clone(), content));
        }

        Ok(report)
    }
}

/// Run one handler, turning a panic into a `ToolExecutionError`.
async fn invoke(
    tool: &dyn Tool,
    ctx: &mut IterationContext,
    arguments: Arguments,
) -> Result<String, Failure> {
    match AssertUnwindSafe(tool.execute(ctx, arguments))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome.into_result(),
        Err(payload) => Err(ToolError::ExecutionFailed {
            tool_name: tool.name().to_string(),
            reason: panic_message(payload.as_ref()),
        }
        .into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailTool, LogTool, PanicTool};
    use acontext_core::error::ErrorKind;
    use acontext_store::InMemoryStore;

    async fn context(store: &InMemoryStore) -> IterationContext {
        let session_id = store.create_session().await;
        IterationContext::open(store, session_id, Arc::from(vec![]), Arc::from(vec![]))
            .await
            .into_result()
            .unwrap()
    }

    fn dispatcher(log: &LogTool) -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(log.clone()));
        registry.register(Box::new(FailTool));
        registry.register(Box::new(PanicTool));
        Dispatcher::new(Arc::new(registry))
    }

    fn call(id: &str, name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, name, args)
    }

    #[tokio::test]
    async fn records_follow_request_order() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let log = LogTool::default();
        let report = dispatcher(&log)
            .dispatch(
                &mut ctx,
                &[
                    call("a", "log", r#"{"n":1}"#),
                    call("b", "log", r#"{"n":2}"#),
                    call("c", "log", r#"{"n":3}"#),
                ],
            )
            .await
            .into_result()
            .unwrap();

        let ids: Vec<&str> = report.responses.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.responses[2].content, "logged #3");
        assert!(!report.finished);
    }

    #[tokio::test]
    async fn finish_first_still_runs_the_rest() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let log = LogTool::default();
        let report = dispatcher(&log)
            .dispatch(&mut ctx, &[call("f", "finish", "{}"), call("a", "log", "{}")])
            .await
            .into_result()
            .unwrap();
        assert!(report.finished);
        assert_eq!(report.responses.len(), 1);
        assert_eq!(log.call_count(), 1);
    }

    #[tokio::test]
    async fn finish_arguments_are_never_parsed() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let report = dispatcher(&LogTool::default())
            .dispatch(&mut ctx, &[call("f", "finish", "garbage")])
            .await;
        assert!(report.value().unwrap().finished);
    }

    #[tokio::test]
    async fn malformed_arguments_stop_the_batch() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let log = LogTool::default();
        let failure = dispatcher(&log)
            .dispatch(&mut ctx, &[call("a", "log", "not-json"), call("b", "log", "{}")])
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert!(failure.message.starts_with("LLM tool arguments JSON decode error"));
        assert_eq!(log.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let failure = dispatcher(&LogTool::default())
            .dispatch(&mut ctx, &[call("a", "foo", "{}")])
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NotFound);
        assert_eq!(failure.message, "Tool foo not found");
    }

    #[tokio::test]
    async fn handler_failure_passes_through_unchanged() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let log = LogTool::default();
        let failure = dispatcher(&log)
            .dispatch(&mut ctx, &[call("a", "log", "{}"), call("b", "fail", "{}"), call("c", "log", "{}")])
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(failure, Failure::tool_execution("disk full"));
        assert_eq!(log.call_count(), 1);
    }

    #[tokio::test]
    async fn panic_becomes_tool_execution_error() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let failure = dispatcher(&LogTool::default())
            .dispatch(&mut ctx, &[call("a", "explode", "{}")])
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ToolExecution);
        assert_eq!(failure.message, "Tool explode error: index out of bounds");
    }

    #[tokio::test]
    async fn context_stays_usable_after_a_panic() {
        let store = InMemoryStore::new();
        let mut ctx = context(&store).await;
        let _ = dispatcher(&LogTool::default())
            .dispatch(&mut ctx, &[call("a", "explode", "{}")])
            .await;
        assert!(ctx.release().await.is_success());
        assert_eq!(store.stats().committed, 1);
    }
}
