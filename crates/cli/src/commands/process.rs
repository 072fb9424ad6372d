//! `acontext process`: store a message batch and run the task agent over it.

use acontext_agent::{TaskAgent, track_process};
use acontext_config::AppConfig;
use acontext_core::message::{Message, Part, Role};
use acontext_core::store::SessionStore;
use acontext_store::SqliteStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::open_store;
use super::tasks::print_tasks;

pub struct ProcessArgs {
    pub session_id: Uuid,
    pub messages_path: PathBuf,
    pub previous: usize,
    pub max_iterations: u32,
}

/// One entry of the input file.
#[derive(Debug, Deserialize)]
pub struct MessageInput {
    pub role: Role,

    #[serde(default)]
    pub parts: Vec<Part>,

    /// Shorthand for a single text part
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl MessageInput {
    fn into_message(self, session_id: Uuid) -> Message {
        let mut parts = self.parts;
        if let Some(text) = self.text {
            parts.insert(0, Part::text(text));
        }
        let message = Message::new(session_id, self.role, parts);
        match self.parent_id {
            Some(parent) => message.with_parent(parent),
            None => message,
        }
    }
}

/// Parse the input file into messages for `session_id`.
pub fn read_batch(path: &Path, session_id: Uuid) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let inputs: Vec<MessageInput> = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
    if inputs.is_empty() {
        return Err(format!("{} holds no messages", path.display()).into());
    }
    Ok(inputs
        .into_iter()
        .map(|input| input.into_message(session_id))
        .collect())
}

/// The last `count` stored messages of the session, oldest first.
async fn previous_messages(
    store: &SqliteStore,
    session_id: Uuid,
    count: usize,
) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let mut history = store.list_messages(session_id).await?;
    let skip = history.len().saturating_sub(count);
    Ok(history.split_off(skip))
}

pub async fn run(config: &AppConfig, args: ProcessArgs) -> Result<(), Box<dyn std::error::Error>> {
    let provider = acontext_providers::build_from_config(config)?;
    let store = Arc::new(open_store(config).await?);

    if !store.session_exists(args.session_id).await? {
        return Err(format!("Session {} not found", args.session_id).into());
    }

    let batch = read_batch(&args.messages_path, args.session_id)?;
    let previous = previous_messages(&store, args.session_id, args.previous).await?;
    for message in &batch {
        store.insert_message(message).await?;
    }
    info!(
        session_id = %args.session_id,
        new = batch.len(),
        previous = previous.len(),
        "Stored message batch"
    );

    let agent = TaskAgent::new(
        Arc::new(provider),
        store.clone(),
        Arc::new(acontext_tools::default_registry()),
    );
    track_process(
        "task_agent",
        agent.orchestrate(args.session_id, &previous, &batch, args.max_iterations),
    )
    .await
    .into_result()?;

    let tasks = store.fetch_current_tasks(args.session_id).await.into_result()?;
    print_tasks(&tasks);
    Ok(())
}
