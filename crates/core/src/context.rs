//! Iteration context: the view tool handlers get during one dispatch pass.
//!
//! A context binds one store transaction to one immutable snapshot of the
//! session's task and message identifiers, both taken when the loop fetched
//! its tasks. Handlers address tasks by 1-based order and messages by their
//! 0-based position in the current batch; the context resolves both against
//! the snapshot.
//!
//! [`IterationContext::release`] commits the transaction. A context dropped
//! without release (for example because the surrounding future was
//! cancelled) drops its transaction, which rolls it back.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::Failure;
use crate::outcome::Outcome;
use crate::store::{SessionStore, StoreTransaction};

pub struct IterationContext {
    session_id: Uuid,
    task_ids: Arc<[Uuid]>,
    message_ids: Arc<[Uuid]>,
    tx: Box<dyn StoreTransaction>,
}

impl IterationContext {
    pub fn new(
        session_id: Uuid,
        task_ids: Arc<[Uuid]>,
        message_ids: Arc<[Uuid]>,
        tx: Box<dyn StoreTransaction>,
    ) -> Self {
        Self {
            session_id,
            task_ids,
            message_ids,
            tx,
        }
    }

    /// Begin a transaction on `store` and wrap it with the snapshots.
    pub async fn open(
        store: &dyn SessionStore,
        session_id: Uuid,
        task_ids: Arc<[Uuid]>,
        message_ids: Arc<[Uuid]>,
    ) -> Outcome<Self> {
        store
            .begin()
            .await
            .map(|tx| Self::new(session_id, task_ids, message_ids, tx))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn task_ids(&self) -> &[Uuid] {
        &self.task_ids
    }

    pub fn message_ids(&self) -> &[Uuid] {
        &self.message_ids
    }

    /// Resolve a 1-based task order against the snapshot.
    pub fn task_id_at(&self, order: u32) -> Outcome<Uuid> {
        let found = (order as usize)
            .checked_sub(1)
            .and_then(|slot| self.task_ids.get(slot));
        match found {
            Some(id) => Outcome::success(*id),
            None => Outcome::from_failure(Failure::not_found(format!(
                "Task order {order} is out of range (session has {} tasks)",
                self.task_ids.len()
            ))),
        }
    }

    /// Resolve a 0-based position in the current message batch.
    pub fn message_id_at(&self, index: usize) -> Outcome<Uuid> {
        match self.message_ids.get(index) {
            Some(id) => Outcome::success(*id),
            None => Outcome::from_failure(Failure::not_found(format!(
                "Message id {index} is out of range (batch has {} messages)",
                self.message_ids.len()
            ))),
        }
    }

    /// The transaction this pass writes through.
    pub fn transaction(&mut self) -> &mut dyn StoreTransaction {
        self.tx.as_mut()
    }

    /// End the pass and commit its writes.
    pub async fn release(self) -> Outcome<()> {
        self.tx.commit().await
    }
}

impl std::fmt::Debug for IterationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationContext")
            .field("session_id", &self.session_id)
            .field("task_ids", &self.task_ids.len())
            .field("message_ids", &self.message_ids.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::TaskUpdate;
    use crate::task::Task;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlagTransaction {
        committed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl StoreTransaction for FlagTransaction {
        async fn insert_task(&mut self, session_id: Uuid, after_order: u32, description: &str) -> Outcome<Task> {
            Outcome::success(Task::new(session_id, after_order + 1, description))
        }
        async fn update_task(&mut self, _task_id: Uuid, _update: TaskUpdate) -> Outcome<Task> {
            Outcome::failure(ErrorKind::NotFound, "no tasks here")
        }
        async fn attach_messages(&mut self, _task_id: Uuid, message_ids: &[Uuid]) -> Outcome<usize> {
            Outcome::success(message_ids.len())
        }
        async fn commit(self: Box<Self>) -> Outcome<()> {
            self.committed.store(true, Ordering::SeqCst);
            Outcome::success(())
        }
        async fn rollback(self: Box<Self>) -> Outcome<()> {
            Outcome::success(())
        }
    }

    fn context(tasks: usize, messages: usize) -> (IterationContext, Arc<AtomicBool>) {
        let committed = Arc::new(AtomicBool::new(false));
        let task_ids: Arc<[Uuid]> = (0..tasks).map(|_| Uuid::new_v4()).collect();
        let message_ids: Arc<[Uuid]> = (0..messages).map(|_| Uuid::new_v4()).collect();
        let ctx = IterationContext::new(
            Uuid::new_v4(),
            task_ids,
            message_ids,
            Box::new(FlagTransaction { committed: committed.clone() }),
        );
        (ctx, committed)
    }

    #[test]
    fn task_orders_are_one_based() {
        let (ctx, _) = context(2, 0);
        assert_eq!(ctx.task_id_at(1).value(), Some(&ctx.task_ids()[0]));
        assert_eq!(ctx.task_id_at(2).value(), Some(&ctx.task_ids()[1]));
        assert_eq!(ctx.task_id_at(0).error().unwrap().kind, ErrorKind::NotFound);
        assert_eq!(ctx.task_id_at(3).error().unwrap().kind, ErrorKind::NotFound);
    }

    #[test]
    fn message_positions_are_zero_based() {
        let (ctx, _) = context(0, 2);
        assert_eq!(ctx.message_id_at(0).value(), Some(&ctx.message_ids()[0]));
        let failure = ctx.message_id_at(2).into_result().unwrap_err();
        assert!(failure.message.contains("batch has 2 messages"));
    }

    #[tokio::test]
    async fn release_commits_the_transaction() {
        let (mut ctx, committed) = context(1, 1);
        let session_id = ctx.session_id();
        let task = ctx
            .transaction()
            .insert_task(session_id, 1, "follow up")
            .await
            .into_result()
            .unwrap();
        assert_eq!(task.order, 2);
        assert!(!committed.load(Ordering::SeqCst));
        assert!(ctx.release().await.is_success());
        assert!(committed.load(Ordering::SeqCst));
    }
}
