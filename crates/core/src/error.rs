//! Error types for the Acontext domain.
//!
//! Two layers live here:
//! - [`Failure`] is the error branch of an [`Outcome`](crate::Outcome): a kind
//!   plus a human-readable message, returned unchanged through the agent loop.
//! - Bounded-context enums (`ProviderError`, `StoreError`, `ToolError`) built
//!   with `thiserror`, each converting into a `Failure` of the matching kind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The category of a [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input: tool arguments that do not parse, bad field values.
    #[serde(rename = "ValidationError")]
    Validation,

    /// Unknown tool name, missing session, out-of-range task order.
    #[serde(rename = "NotFoundError")]
    NotFound,

    /// The completion service failed (network, rate limit, bad payload).
    #[serde(rename = "UpstreamError")]
    Upstream,

    /// A tool handler reported a failure or panicked.
    #[serde(rename = "ToolExecutionError")]
    ToolExecution,

    /// The persistence layer failed (query, commit, connection).
    #[serde(rename = "StorageError")]
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Upstream => "UpstreamError",
            ErrorKind::ToolExecution => "ToolExecutionError",
            ErrorKind::Storage => "StorageError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error: what went wrong, in which category.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolExecution, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool {tool_name} error: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl From<ProviderError> for Failure {
    fn from(err: ProviderError) -> Self {
        Failure::upstream(err.to_string())
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Failure::not_found(err.to_string()),
            other => Failure::storage(other.to_string()),
        }
    }
}

impl From<ToolError> for Failure {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(_) => Failure::not_found(err.to_string()),
            ToolError::InvalidArguments(_) => Failure::validation(err.to_string()),
            ToolError::ExecutionFailed { .. } => Failure::tool_execution(err.to_string()),
        }
    }
}
