use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use chronochat_types::{Message, Role, Thread, ToolTrace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// MongoDB thread document; `_id` is the opaque uuid string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
    pub total_tokens: i64,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// MongoDB message document, unique on `(thread_id, sequence)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub thread_id: String,
    pub sequence: i64,
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub token_count: i64,
    #[serde(default)]
    pub tool_calls: Vec<ToolTrace>,
}

impl From<Thread> for MongoThread {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            owner_id: thread.owner_id,
            title: thread.title,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            message_count: thread.message_count as i64,
            total_tokens: thread.total_tokens as i64,
            archived: thread.archived,
            metadata: thread.metadata,
        }
    }
}

impl From<MongoThread> for Thread {
    fn from(thread: MongoThread) -> Self {
        Self {
            id: thread.id,
            owner_id: thread.owner_id,
            title: thread.title,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            message_count: thread.message_count.max(0) as u64,
            total_tokens: thread.total_tokens.max(0) as u64,
            archived: thread.archived,
            metadata: thread.metadata,
        }
    }
}

impl From<Message> for MongoMessage {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            thread_id: message.thread_id,
            sequence: message.sequence as i64,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
            provider: message.provider,
            model: message.model,
            token_count: message.token_count as i64,
            tool_calls: message.tool_calls,
        }
    }
}

impl From<MongoMessage> for Message {
    fn from(message: MongoMessage) -> Self {
        Self {
            id: message.id,
            thread_id: message.thread_id,
            sequence: message.sequence.max(0) as u64,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
            provider: message.provider,
            model: message.model,
            token_count: message.token_count.clamp(0, u32::MAX as i64) as u32,
            tool_calls: message.tool_calls,
        }
    }
}
