//! # Acontext Core
//!
//! Domain types, traits, and error definitions for the Acontext task agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! and the seams (completion provider, session store, tools) that every other
//! crate implements against.
//!
//! ## Design Philosophy
//!
//! Failures travel as values. Every fallible operation the agent loop touches
//! returns an [`Outcome`], which carries either a value or a structured
//! [`Failure`] (kind + message). Nothing in the loop raises or panics to signal
//! an error.

pub mod context;
pub mod error;
pub mod message;
pub mod outcome;
pub mod provider;
pub mod store;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::IterationContext;
pub use error::{ErrorKind, Failure};
pub use message::{Message, Part, PartKind, Role};
pub use outcome::Outcome;
pub use provider::{CompletionRequest, CompletionResponse, Provider, ToolDefinition};
pub use store::{SessionStore, StoreTransaction, TaskUpdate};
pub use task::{Task, TaskStatus};
pub use tool::{Arguments, FINISH_TOOL, Tool, ToolCallRequest, ToolRegistry, ToolResponseRecord};
