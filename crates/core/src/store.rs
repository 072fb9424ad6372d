//! Session store traits: the persistence seam the agent loop consumes.
//!
//! The loop reads tasks once through [`SessionStore::fetch_current_tasks`] and
//! opens one [`StoreTransaction`] per dispatch pass. Tool handlers mutate tasks
//! only through that transaction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::outcome::Outcome;
use crate::task::{Task, TaskStatus};

/// Fields to change on a task. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub description: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.description.is_none()
    }
}

/// Read access and transaction factory for session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A human-readable name for this backend (e.g., "sqlite").
    fn name(&self) -> &str;

    /// The session's tasks ordered by task order.
    ///
    /// An unknown session is a `NotFoundError`.
    async fn fetch_current_tasks(&self, session_id: Uuid) -> Outcome<Vec<Task>>;

    /// Open a fresh transaction.
    async fn begin(&self) -> Outcome<Box<dyn StoreTransaction>>;
}

/// Writes scoped to one transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls it
/// back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a pending task right after `after_order` (0 = at the front).
    /// Tasks behind it move down by one.
    async fn insert_task(
        &mut self,
        session_id: Uuid,
        after_order: u32,
        description: &str,
    ) -> Outcome<Task>;

    /// Apply `update` to the task and return its new state.
    async fn update_task(&mut self, task_id: Uuid, update: TaskUpdate) -> Outcome<Task>;

    /// Point the given messages at the task. Returns how many were attached.
    async fn attach_messages(&mut self, task_id: Uuid, message_ids: &[Uuid]) -> Outcome<usize>;

    async fn commit(self: Box<Self>) -> Outcome<()>;

    async fn rollback(self: Box<Self>) -> Outcome<()>;
}
