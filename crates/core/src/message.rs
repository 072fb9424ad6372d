//! Message domain types.
//!
//! Messages are stored flat: a message refers to its parent and to the task it
//! was attached to by identifier only. Walking a thread means looking the
//! parent id up in the store, never following an owning reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Tool execution result
    Tool,
    /// Legacy function-call result
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
            Role::Function => "function",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" => Ok(Role::Tool),
            "function" => Ok(Role::Function),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

/// What a [`Part`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartKind {
    Text,
    Image,
    Audio,
    Video,
    File,
    ToolCall,
    ToolResult,
    Data,
}

impl PartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Text => "text",
            PartKind::Image => "image",
            PartKind::Audio => "audio",
            PartKind::Video => "video",
            PartKind::File => "file",
            PartKind::ToolCall => "tool-call",
            PartKind::ToolResult => "tool-result",
            PartKind::Data => "data",
        }
    }
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "type")]
    pub kind: PartKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Uploaded asset backing a media part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_b: Option<u64>,

    /// Embedding, OCR, ASR, caption metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PartKind::Text,
            text: Some(text.into()),
            asset_id: None,
            mime: None,
            filename: None,
            size_b: None,
            meta: None,
        }
    }

    /// Render this part as prompt text.
    ///
    /// Text parts render their text; everything else renders as a bracketed
    /// placeholder naming the kind and, when known, the filename or mime type.
    pub fn render(&self) -> String {
        if let (PartKind::Text, Some(text)) = (self.kind, &self.text) {
            return text.clone();
        }
        match self.filename.as_deref().or(self.mime.as_deref()) {
            Some(label) => format!("[{}: {}]", self.kind.as_str(), label),
            None => format!("[{}]", self.kind.as_str()),
        }
    }
}

/// A single persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,

    pub session_id: Uuid,

    /// The message this one replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,

    pub role: Role,

    pub parts: Vec<Part>,

    /// The task this message was attached to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: Uuid, role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            parent_id: None,
            role,
            parts,
            task_id: None,
            created_at: Utc::now(),
        }
    }

    /// A single-part user text message.
    pub fn user(session_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(session_id, Role::User, vec![Part::text(text)])
    }

    /// A single-part assistant text message.
    pub fn assistant(session_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(session_id, Role::Assistant, vec![Part::text(text)])
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Render as one prompt line: `role: part part ...`.
    pub fn render(&self) -> String {
        let body = self
            .parts
            .iter()
            .map(Part::render)
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}: {}", self.role, body)
    }
}
