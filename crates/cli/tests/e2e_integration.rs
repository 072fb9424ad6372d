//! End-to-end tests for the task agent.
//!
//! These run the whole pipeline against a real SQLite file: stored messages,
//! the default task tools, the loop and the process wrapper. Only the
//! completion service is scripted.

use std::sync::{Arc, Mutex};

use acontext_agent::{TaskAgent, track_process};
use acontext_core::error::ErrorKind;
use acontext_core::message::Message;
use acontext_core::outcome::Outcome;
use acontext_core::provider::{CompletionRequest, CompletionResponse, Provider};
use acontext_core::store::SessionStore;
use acontext_core::task::TaskStatus;
use acontext_core::tool::ToolCallRequest;
use acontext_store::SqliteStore;
use acontext_tools::default_registry;
use tempfile::TempDir;
use uuid::Uuid;

// ── Scripted provider ────────────────────────────────────────────────────

/// Plays back one response per call; the last one repeats.
struct ScriptedProvider {
    responses: Vec<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Outcome<CompletionResponse> {
        let mut requests = self.requests.lock().unwrap();
        let slot = requests.len().min(self.responses.len() - 1);
        requests.push(request);
        Outcome::success(self.responses[slot].clone())
    }
}

fn tool_calls(calls: &[(&str, serde_json::Value)]) -> CompletionResponse {
    CompletionResponse {
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCallRequest::new(format!("call_{i}"), *name, args.to_string()))
            .collect(),
        model: "mock-model".into(),
        ..CompletionResponse::default()
    }
}

fn text(content: &str) -> CompletionResponse {
    CompletionResponse {
        content: content.into(),
        model: "mock-model".into(),
        ..CompletionResponse::default()
    }
}

// ── Fixture ──────────────────────────────────────────────────────────────

struct Session {
    store: Arc<SqliteStore>,
    session_id: Uuid,
    _dir: TempDir,
}

async fn session() -> Session {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("acontext.db").display());
    let store = Arc::new(SqliteStore::new(&url).await.unwrap());
    let session_id = store.create_session().await.unwrap();
    Session {
        store,
        session_id,
        _dir: dir,
    }
}

impl Session {
    async fn store_batch(&self, texts: &[&str]) -> Vec<Message> {
        let mut batch = Vec::new();
        for text in texts {
            let message = Message::user(self.session_id, *text);
            self.store.insert_message(&message).await.unwrap();
            batch.push(message);
        }
        batch
    }

    fn agent(&self, provider: Arc<ScriptedProvider>) -> TaskAgent {
        TaskAgent::new(provider, self.store.clone(), Arc::new(default_registry()))
    }

    async fn task_lines(&self) -> Vec<String> {
        self.store
            .fetch_current_tasks(self.session_id)
            .await
            .into_result()
            .unwrap()
            .iter()
            .map(|t| t.render())
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plan_is_recorded_then_messages_attached() {
    let s = session().await;
    let batch = s
        .store_batch(&["build the landing page", "then deploy it to staging"])
        .await;

    let planner = Arc::new(ScriptedProvider::new(vec![tool_calls(&[
        ("insert_task", serde_json::json!({"after_task_order": 0, "task_description": "Build the landing page"})),
        ("insert_task", serde_json::json!({"after_task_order": 1, "task_description": "Deploy to staging"})),
        ("finish", serde_json::json!({})),
    ])]));
    let outcome =
        track_process("task_agent", s.agent(planner.clone()).orchestrate(s.session_id, &[], &batch, 3)).await;
    assert!(outcome.is_success(), "{:?}", outcome.error());
    assert_eq!(planner.calls(), 1);
    assert_eq!(
        s.task_lines().await,
        vec![
            "Task 1: Build the landing page (Status: pending)",
            "Task 2: Deploy to staging (Status: pending)",
        ]
    );

    // Task orders resolve against the list fetched at the start of a call,
    // so attaching to the new tasks takes a second call.
    let linker = Arc::new(ScriptedProvider::new(vec![tool_calls(&[
        ("append_messages_to_task", serde_json::json!({"task_order": 1, "message_ids": [0]})),
        ("append_messages_to_task", serde_json::json!({"task_order": 2, "message_ids": [1]})),
        ("finish", serde_json::json!({})),
    ])]));
    let outcome = s.agent(linker).orchestrate(s.session_id, &[], &batch, 3).await;
    assert!(outcome.is_success(), "{:?}", outcome.error());

    let tasks = s.store.fetch_current_tasks(s.session_id).await.into_result().unwrap();
    let messages = s.store.list_messages(s.session_id).await.unwrap();
    assert_eq!(messages[0].task_id, Some(tasks[0].id));
    assert_eq!(messages[1].task_id, Some(tasks[1].id));
}

#[tokio::test]
async fn e2e_second_batch_updates_existing_tasks() {
    let s = session().await;

    let first = s.store_batch(&["write the migration"]).await;
    let setup = Arc::new(ScriptedProvider::new(vec![tool_calls(&[
        ("insert_task", serde_json::json!({"after_task_order": 0, "task_description": "Write the migration"})),
        ("finish", serde_json::json!({})),
    ])]));
    assert!(s.agent(setup).orchestrate(s.session_id, &[], &first, 3).await.is_success());

    let second = s.store_batch(&["migration is done"]).await;
    let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(&[
        ("update_task", serde_json::json!({"task_order": 1, "task_status": "success"})),
        ("append_messages_to_task", serde_json::json!({"task_order": 1, "message_ids": [0]})),
        ("finish", serde_json::json!({})),
    ])]));
    let outcome = s.agent(provider.clone()).orchestrate(s.session_id, &first, &second, 3).await;
    assert!(outcome.is_success(), "{:?}", outcome.error());

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("- Task 1: Write the migration (Status: pending)"));
    assert!(prompt.contains("user: write the migration"));
    assert!(prompt.contains("<message id=0> user: migration is done </message>"));

    let tasks = s.store.fetch_current_tasks(s.session_id).await.into_result().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Success);
}

#[tokio::test]
async fn e2e_writes_before_a_failing_call_are_kept() {
    let s = session().await;
    let batch = s.store_batch(&["set up CI"]).await;

    let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(&[
        ("insert_task", serde_json::json!({"after_task_order": 0, "task_description": "Set up CI"})),
        ("update_task", serde_json::json!({"task_order": 7, "task_status": "running"})),
    ])]));
    let failure = s
        .agent(provider.clone())
        .orchestrate(s.session_id, &[], &batch, 3)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert_eq!(provider.calls(), 1);
    assert_eq!(s.task_lines().await, vec!["Task 1: Set up CI (Status: pending)"]);
}

#[tokio::test]
async fn e2e_plain_reply_changes_nothing() {
    let s = session().await;
    let batch = s.store_batch(&["thanks!"]).await;

    let provider = Arc::new(ScriptedProvider::new(vec![text("Nothing to track.")]));
    let outcome = s.agent(provider.clone()).orchestrate(s.session_id, &[], &batch, 3).await;

    assert!(outcome.is_success());
    assert_eq!(provider.calls(), 1);
    assert!(s.task_lines().await.is_empty());
}

#[tokio::test]
async fn e2e_unknown_session_is_not_found() {
    let s = session().await;
    let stranger = Uuid::new_v4();
    let batch = vec![Message::user(stranger, "hello")];

    let provider = Arc::new(ScriptedProvider::new(vec![text("unused")]));
    let failure = s
        .agent(provider.clone())
        .orchestrate(stranger, &[], &batch, 3)
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn e2e_cap_stops_a_model_that_never_finishes() {
    let s = session().await;
    let batch = s.store_batch(&["keep going"]).await;

    let provider = Arc::new(ScriptedProvider::new(vec![tool_calls(&[(
        "insert_task",
        serde_json::json!({"after_task_order": 0, "task_description": "Loop step"}),
    )])]));
    let outcome = s.agent(provider.clone()).orchestrate(s.session_id, &[], &batch, 2).await;

    assert!(outcome.is_success());
    assert_eq!(provider.calls(), 2);
    assert_eq!(s.task_lines().await.len(), 2);
}
