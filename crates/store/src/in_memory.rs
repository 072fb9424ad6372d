//! In-memory session store, for tests and ephemeral runs.
//!
//! A transaction reads and validates against a private copy of the state and
//! records every write it makes. Commit replays those writes onto the current
//! shared state under the write lock, so passes on different sessions and
//! writes made outside the transaction are all kept.

use acontext_core::error::StoreError;
use acontext_core::message::Message;
use acontext_core::outcome::Outcome;
use acontext_core::store::{SessionStore, StoreTransaction, TaskUpdate};
use acontext_core::task::Task;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    sessions: HashSet<Uuid>,
    tasks: Vec<Task>,
    messages: Vec<Message>,
}

impl State {
    fn session_tasks(&self, session_id: Uuid) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.order);
        tasks
    }

    fn task_mut(&mut self, task_id: Uuid) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "task",
                id: task_id.to_string(),
            })
    }

    fn apply(&mut self, write: &Write) -> Result<(), StoreError> {
        match write {
            Write::Insert { after_order, task } => self.insert(*after_order, task.clone()),
            Write::Update { task_id, update, at } => self.update(*task_id, update, *at).map(drop),
            Write::Attach { task_id, message_ids } => self.attach(*task_id, message_ids),
        }
    }

    fn insert(&mut self, after_order: u32, mut task: Task) -> Result<(), StoreError> {
        let session_id = task.session_id;
        let count = self.session_tasks(session_id).len() as u32;
        if after_order > count {
            return Err(StoreError::NotFound {
                entity: "task order",
                id: after_order.to_string(),
            });
        }
        for later in self
            .tasks
            .iter_mut()
            .filter(|t| t.session_id == session_id && t.order > after_order)
        {
            later.order += 1;
        }
        task.order = after_order + 1;
        self.tasks.push(task);
        Ok(())
    }

    fn update(&mut self, task_id: Uuid, update: &TaskUpdate, at: DateTime<Utc>) -> Result<Task, StoreError> {
        let task = self.task_mut(task_id)?;
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(description) = &update.description {
            task.description = description.clone();
        }
        task.updated_at = at;
        Ok(task.clone())
    }

    fn attach(&mut self, task_id: Uuid, message_ids: &[Uuid]) -> Result<(), StoreError> {
        let session_id = self.task_mut(task_id)?.session_id;
        for message_id in message_ids {
            let message = self
                .messages
                .iter_mut()
                .find(|m| m.id == *message_id && m.session_id == session_id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "message",
                    id: message_id.to_string(),
                })?;
            message.task_id = Some(task_id);
        }
        Ok(())
    }
}

/// One recorded transaction write, replayed at commit.
#[derive(Debug, Clone)]
enum Write {
    Insert { after_order: u32, task: Task },
    Update { task_id: Uuid, update: TaskUpdate, at: DateTime<Utc> },
    Attach { task_id: Uuid, message_ids: Vec<Uuid> },
}

#[derive(Debug, Default)]
struct Counters {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

/// How many transactions a store has seen end each way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionStats {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

/// A [`SessionStore`] that keeps everything in a Vec behind a lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.sessions.insert(id);
        id
    }

    /// Add a message to its session. The session must exist.
    pub async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains(&message.session_id) {
            return Err(StoreError::NotFound {
                entity: "session",
                id: message.session_id.to_string(),
            });
        }
        state.messages.push(message);
        Ok(())
    }

    /// Append a task at the end of the session's list, bypassing transactions.
    pub async fn seed_task(&self, session_id: Uuid, description: &str) -> Task {
        let mut state = self.state.write().await;
        state.sessions.insert(session_id);
        let order = state.session_tasks(session_id).len() as u32 + 1;
        let task = Task::new(session_id, order, description);
        state.tasks.push(task.clone());
        task
    }

    /// Committed tasks of a session, by order.
    pub async fn tasks(&self, session_id: Uuid) -> Vec<Task> {
        self.state.read().await.session_tasks(session_id)
    }

    /// Committed messages of a session, in insertion order.
    pub async fn messages(&self, session_id: Uuid) -> Vec<Message> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            begun: self.counters.begun.load(Ordering::SeqCst),
            committed: self.counters.committed.load(Ordering::SeqCst),
            rolled_back: self.counters.rolled_back.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn fetch_current_tasks(&self, session_id: Uuid) -> Outcome<Vec<Task>> {
        let state = self.state.read().await;
        if !state.sessions.contains(&session_id) {
            return Err::<Vec<Task>, _>(StoreError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            })
            .into();
        }
        Outcome::success(state.session_tasks(session_id))
    }

    async fn begin(&self) -> Outcome<Box<dyn StoreTransaction>> {
        let staged = self.state.read().await.clone();
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        let tx = InMemoryTransaction {
            staged,
            writes: Vec::new(),
            shared: self.state.clone(),
            counters: self.counters.clone(),
            finished: false,
        };
        Outcome::success(Box::new(tx) as Box<dyn StoreTransaction>)
    }
}

/// A staged copy of the store state plus the writes made against it.
/// Dropping it unfinished counts as a rollback.
pub struct InMemoryTransaction {
    staged: State,
    writes: Vec<Write>,
    shared: Arc<RwLock<State>>,
    counters: Arc<Counters>,
    finished: bool,
}

impl InMemoryTransaction {
    fn record(&mut self, write: Write) -> Result<(), StoreError> {
        self.staged.apply(&write)?;
        self.writes.push(write);
        Ok(())
    }

    fn insert(&mut self, session_id: Uuid, after_order: u32, description: &str) -> Result<Task, StoreError> {
        let task = Task::new(session_id, after_order + 1, description);
        self.record(Write::Insert {
            after_order,
            task: task.clone(),
        })?;
        Ok(task)
    }

    fn update(&mut self, task_id: Uuid, update: TaskUpdate) -> Result<Task, StoreError> {
        let at = Utc::now();
        let task = self.staged.update(task_id, &update, at)?;
        self.writes.push(Write::Update { task_id, update, at });
        Ok(task)
    }

    fn attach(&mut self, task_id: Uuid, message_ids: &[Uuid]) -> Result<usize, StoreError> {
        self.record(Write::Attach {
            task_id,
            message_ids: message_ids.to_vec(),
        })?;
        Ok(message_ids.len())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert_task(&mut self, session_id: Uuid, after_order: u32, description: &str) -> Outcome<Task> {
        self.insert(session_id, after_order, description).into()
    }

    async fn update_task(&mut self, task_id: Uuid, update: TaskUpdate) -> Outcome<Task> {
        self.update(task_id, update).into()
    }

    async fn attach_messages(&mut self, task_id: Uuid, message_ids: &[Uuid]) -> Outcome<usize> {
        self.attach(task_id, message_ids).into()
    }

    async fn commit(mut self: Box<Self>) -> Outcome<()> {
        self.finished = true;
        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for write in &self.writes {
            if let Err(e) = next.apply(write) {
                self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
                return Err::<(), _>(StoreError::QueryFailed(format!("commit: {e}"))).into();
            }
        }
        *shared = next;
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        Outcome::success(())
    }

    async fn rollback(mut self: Box<Self>) -> Outcome<()> {
        self.finished = true;
        self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        Outcome::success(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        }
    }
}
