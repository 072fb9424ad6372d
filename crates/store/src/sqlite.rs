//! SQLite session store.
//!
//! One database file with three tables:
//! - `sessions`: one row per conversation session
//! - `messages`: flat message store; `parent_id` and `task_id` hold ids
//! - `tasks`: ordered per session by `task_order` (1-based, contiguous)
//!
//! Timestamps are RFC 3339 text, ids are hyphenated UUID text.

use acontext_core::error::StoreError;
use acontext_core::message::{Message, Part, Role};
use acontext_core::outcome::Outcome;
use acontext_core::store::{SessionStore, StoreTransaction, TaskUpdate};
use acontext_core::task::{Task, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, session_id, task_order, task_status, task_description, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, session_id, parent_id, role, parts, task_id, created_at";

/// A SQLite-backed [`SessionStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` with a 4-connection pool.
    ///
    /// Accepts `sqlite://path/to/file.db` or `sqlite::memory:`.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        Self::connect(url, 4).await
    }

    /// Open (or create) the database at `url` with the given pool size.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes. Safe to run on every start.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                configs     TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id                TEXT PRIMARY KEY,
                session_id        TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                task_order        INTEGER NOT NULL,
                task_status       TEXT NOT NULL DEFAULT 'pending'
                                  CHECK (task_status IN ('pending', 'running', 'success', 'failed')),
                task_description  TEXT NOT NULL,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("tasks table: {e}")))?;

        // Not unique: shifting orders on insert passes through duplicates
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_session_order ON tasks(session_id, task_order)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("task order index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          TEXT PRIMARY KEY,
                session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                parent_id   TEXT REFERENCES messages(id) ON DELETE CASCADE,
                role        TEXT NOT NULL
                            CHECK (role IN ('user', 'assistant', 'system', 'tool', 'function')),
                parts       TEXT NOT NULL,
                task_id     TEXT REFERENCES tasks(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("message session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Create an empty session and return its id.
    pub async fn create_session(&self) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO sessions (id, configs, created_at, updated_at) VALUES (?1, NULL, ?2, ?2)")
            .bind(id.to_string())
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("insert session: {e}")))?;
        debug!(session_id = %id, "Created session");
        Ok(id)
    }

    pub async fn session_exists(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM sessions WHERE id = ?1")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("lookup session: {e}")))?;
        Ok(found.is_some())
    }

    /// Persist a message. Its session must exist.
    pub async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let parts = serde_json::to_string(&message.parts)
            .map_err(|e| StoreError::QueryFailed(format!("serialize parts: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, parent_id, role, parts, task_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.parent_id.map(|id| id.to_string()))
        .bind(message.role.as_str())
        .bind(parts)
        .bind(message.task_id.map(|id| id.to_string()))
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert message: {e}")))?;
        Ok(())
    }

    /// All messages of a session in insertion order.
    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = ?1 ORDER BY created_at, rowid"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get task: {e}")))?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn fetch_tasks(&self, session_id: Uuid) -> Result<Vec<Task>, StoreError> {
        if !self.session_exists(session_id).await? {
            return Err(StoreError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            });
        }

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE session_id = ?1 ORDER BY task_order"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("fetch tasks: {e}")))?;

        rows.iter().map(row_to_task).collect()
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch_current_tasks(&self, session_id: Uuid) -> Outcome<Vec<Task>> {
        self.fetch_tasks(session_id).await.into()
    }

    /// Opens the pass with `BEGIN IMMEDIATE` so it holds the write lock from
    /// the start. Concurrent passes wait on the busy timeout instead of
    /// failing on a stale read snapshot.
    async fn begin(&self) -> Outcome<Box<dyn StoreTransaction>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map(|tx| Box::new(SqliteTransaction { tx }) as Box<dyn StoreTransaction>)
            .map_err(|e| StoreError::Connection(format!("begin transaction: {e}")))
            .into()
    }
}

/// One open SQLite transaction. Dropping it rolls back.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTransaction {
    async fn load_task(&mut self, task_id: Uuid) -> Result<Task, StoreError> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))
            .bind(task_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("load task: {e}")))?;
        match row {
            Some(row) => row_to_task(&row),
            None => Err(StoreError::NotFound {
                entity: "task",
                id: task_id.to_string(),
            }),
        }
    }

    async fn insert(
        &mut self,
        session_id: Uuid,
        after_order: u32,
        description: &str,
    ) -> Result<Task, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE session_id = ?1")
            .bind(session_id.to_string())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count tasks: {e}")))?;
        if i64::from(after_order) > count {
            return Err(StoreError::NotFound {
                entity: "task order",
                id: after_order.to_string(),
            });
        }

        sqlx::query(
            "UPDATE tasks SET task_order = task_order + 1 WHERE session_id = ?1 AND task_order > ?2",
        )
        .bind(session_id.to_string())
        .bind(i64::from(after_order))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("shift task orders: {e}")))?;

        let task = Task::new(session_id, after_order + 1, description);
        sqlx::query(
            r#"
            INSERT INTO tasks (id, session_id, task_order, task_status, task_description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(task.id.to_string())
        .bind(session_id.to_string())
        .bind(i64::from(task.order))
        .bind(task.status.as_str())
        .bind(&task.description)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert task: {e}")))?;

        debug!(task_id = %task.id, order = task.order, "Inserted task");
        Ok(task)
    }

    async fn update(&mut self, task_id: Uuid, update: TaskUpdate) -> Result<Task, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                task_status = COALESCE(?1, task_status),
                task_description = COALESCE(?2, task_description),
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.description)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("update task: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "task",
                id: task_id.to_string(),
            });
        }
        self.load_task(task_id).await
    }

    async fn attach(&mut self, task_id: Uuid, message_ids: &[Uuid]) -> Result<usize, StoreError> {
        let task = self.load_task(task_id).await?;
        let mut attached = 0;
        for message_id in message_ids {
            let result = sqlx::query("UPDATE messages SET task_id = ?1 WHERE id = ?2 AND session_id = ?3")
                .bind(task.id.to_string())
                .bind(message_id.to_string())
                .bind(task.session_id.to_string())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("attach message: {e}")))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "message",
                    id: message_id.to_string(),
                });
            }
            attached += 1;
        }
        Ok(attached)
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert_task(
        &mut self,
        session_id: Uuid,
        after_order: u32,
        description: &str,
    ) -> Outcome<Task> {
        self.insert(session_id, after_order, description).await.into()
    }

    async fn update_task(&mut self, task_id: Uuid, update: TaskUpdate) -> Outcome<Task> {
        self.update(task_id, update).await.into()
    }

    async fn attach_messages(&mut self, task_id: Uuid, message_ids: &[Uuid]) -> Outcome<usize> {
        self.attach(task_id, message_ids).await.into()
    }

    async fn commit(self: Box<Self>) -> Outcome<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("commit: {e}")))
            .into()
    }

    async fn rollback(self: Box<Self>) -> Outcome<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("rollback: {e}")))
            .into()
    }
}

/// Parse a `Task` from a SQLite row.
fn row_to_task(row: &SqliteRow) -> Result<Task, StoreError> {
    let id: String = column(row, "id")?;
    let session_id: String = column(row, "session_id")?;
    let order: i64 = column(row, "task_order")?;
    let status: String = column(row, "task_status")?;
    let description: String = column(row, "task_description")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Task {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        order: u32::try_from(order)
            .map_err(|_| StoreError::Corrupt(format!("task order {order} out of range")))?,
        status: TaskStatus::from_str(&status).map_err(StoreError::Corrupt)?,
        description,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

/// Parse a `Message` from a SQLite row.
fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
    let id: String = column(row, "id")?;
    let session_id: String = column(row, "session_id")?;
    let parent_id: Option<String> = column(row, "parent_id")?;
    let role: String = column(row, "role")?;
    let parts_json: String = column(row, "parts")?;
    let task_id: Option<String> = column(row, "task_id")?;
    let created_at: String = column(row, "created_at")?;

    let parts: Vec<Part> = serde_json::from_str(&parts_json)
        .map_err(|e| StoreError::Corrupt(format!("message parts: {e}")))?;

    Ok(Message {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        parent_id: parent_id.as_deref().map(parse_uuid).transpose()?,
        role: Role::from_str(&role).map_err(StoreError::Corrupt)?,
        parts,
        task_id: task_id.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_time(&created_at)?,
    })
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("id '{raw}': {e}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{raw}': {e}")))
}
