use crate::analytics::AnalyticsStore;
use crate::error::Result;
use async_trait::async_trait;
use chronochat_types::{RequestLog, SessionRecord, UsageCounter, UsageIncrement};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct State {
    counters: HashMap<(String, String), UsageCounter>,
    applied_keys: HashSet<String>,
    requests: Vec<RequestLog>,
    sessions: HashMap<(String, String), SessionRecord>,
}

#[derive(Default)]
pub struct MemoryAnalyticsStore {
    state: Mutex<State>,
}

impl MemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_logs(&self) -> Vec<RequestLog> {
        self.state.lock().requests.clone()
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.state.lock().sessions.values().cloned().collect()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalyticsStore {
    async fn increment_usage(&self, increment: &UsageIncrement) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.applied_keys.insert(increment.idempotency_key.clone()) {
            return Ok(false);
        }
        let counter = state
            .counters
            .entry((increment.subject_id.clone(), increment.period.clone()))
            .or_insert_with(|| UsageCounter {
                subject_id: increment.subject_id.clone(),
                period: increment.period.clone(),
                message_count: 0,
                token_count: 0,
            });
        counter.message_count += increment.delta.messages;
        counter.token_count += increment.delta.tokens;
        Ok(true)
    }

    async fn usage(&self, subject_id: &str, period: &str) -> Result<Option<UsageCounter>> {
        Ok(self
            .state
            .lock()
            .counters
            .get(&(subject_id.to_string(), period.to_string()))
            .cloned())
    }

    async fn record_request(&self, log: &RequestLog) -> Result<()> {
        self.state.lock().requests.push(log.clone());
        Ok(())
    }

    async fn touch_session(&self, session: &SessionRecord) -> Result<()> {
        self.state.lock().sessions.insert(
            (session.subject_id.clone(), session.session_id.clone()),
            session.clone(),
        );
        Ok(())
    }
}
