//! Session store implementations for Acontext.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::{InMemoryStore, TransactionStats};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
