use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// One tool invocation made during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTrace {
    pub call_id: String,
    pub tool_name: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolTrace {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A message built during a turn that has not been sequenced by the store yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub token_count: u32,
    #[serde(default)]
    pub tool_calls: Vec<ToolTrace>,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            provider: None,
            model: None,
            token_count: 0,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(trace: ToolTrace, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_calls.push(trace);
        message
    }

    pub fn with_tokens(mut self, token_count: u32) -> Self {
        self.token_count = token_count;
        self
    }

    pub fn with_source(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    /// Attach the per-thread sequence number assigned by the store
    pub fn into_message(self, thread_id: impl Into<String>, sequence: u64) -> Message {
        Message {
            id: self.id,
            thread_id: thread_id.into(),
            sequence,
            role: self.role,
            content: self.content,
            created_at: self.created_at,
            provider: self.provider,
            model: self.model,
            token_count: self.token_count,
            tool_calls: self.tool_calls,
        }
    }
}

/// A persisted, append-only message
///
/// `sequence` starts at 1 and is gapless per thread. It is the ordering source
/// of truth; `created_at` is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub sequence: u64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub token_count: u32,
    #[serde(default)]
    pub tool_calls: Vec<ToolTrace>,
}

/// Inclusive range of sequence numbers assigned to one appended turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    pub first: u64,
    pub last: u64,
}

impl SequenceRange {
    pub fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    /// Range for `count` messages appended after `previous_last`
    pub fn following(previous_last: u64, count: u64) -> Self {
        Self {
            first: previous_last + 1,
            last: previous_last + count,
        }
    }

    pub fn len(&self) -> u64 {
        self.last + 1 - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> {
        self.first..=self.last
    }
}
