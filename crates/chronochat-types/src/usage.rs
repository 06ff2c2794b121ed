use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Calendar-month period key, e.g. "2025-11"
pub fn period_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub messages: u64,
    pub tokens: u64,
}

impl UsageDelta {
    pub fn new(messages: u64, tokens: u64) -> Self {
        Self { messages, tokens }
    }
}

/// Usage increment request; `idempotency_key` makes redelivery a no-op
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageIncrement {
    pub subject_id: String,
    pub period: String,
    pub delta: UsageDelta,
    pub idempotency_key: String,
}

impl UsageIncrement {
    /// Increment keyed by the first sequence number of a persisted turn, so the
    /// key is reproducible from the conversation store alone
    pub fn for_turn(
        subject_id: impl Into<String>,
        thread_id: &str,
        first_sequence: u64,
        delta: UsageDelta,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            period: period_key(at),
            delta,
            idempotency_key: format!("turn:{}:{}", thread_id, first_sequence),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub subject_id: String,
    pub period: String,
    pub message_count: u64,
    pub token_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    pub subject_id: Option<String>,
    pub operation: String,
    /// Stable outcome kind, "ok" on success
    pub status: String,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub subject_id: String,
    pub session_id: String,
    pub seen_at: DateTime<Utc>,
}
