use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TITLE_MAX_CHARS: usize = 50;

/// Conversation thread, owned exclusively by `owner_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub owner_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: u64,
    pub total_tokens: u64,
    pub archived: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Thread {
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id == subject
    }

    /// Sequence number of the most recent message (0 for an empty thread)
    pub fn last_sequence(&self) -> u64 {
        self.message_count
    }
}

/// Parameters for creating a thread
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewThread {
    /// Caller-chosen id; a fresh uuid is used when absent
    pub id: Option<String>,
    pub owner_id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewThread {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title derived from the first user message of a conversation
    pub fn with_title_from(self, first_message: &str) -> Self {
        let title = derive_title(first_message);
        self.with_title(title)
    }

    pub fn into_thread(self, now: DateTime<Utc>) -> Thread {
        Thread {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            owner_id: self.owner_id,
            title: self.title,
            created_at: now,
            updated_at: now,
            message_count: 0,
            total_tokens: 0,
            archived: false,
            metadata: self.metadata,
        }
    }
}

pub fn derive_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return "New Conversation".to_string();
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}
