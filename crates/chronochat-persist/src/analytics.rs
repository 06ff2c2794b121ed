use crate::error::Result;
use async_trait::async_trait;
use chronochat_types::{RequestLog, SessionRecord, UsageCounter, UsageIncrement};

/// Usage accounting and request telemetry
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Apply an increment at most once per idempotency key. Returns whether
    /// the increment was applied (false for a replay).
    async fn increment_usage(&self, increment: &UsageIncrement) -> Result<bool>;

    async fn usage(&self, subject_id: &str, period: &str) -> Result<Option<UsageCounter>>;

    async fn record_request(&self, log: &RequestLog) -> Result<()>;

    /// Upsert the session's last activity
    async fn touch_session(&self, session: &SessionRecord) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
