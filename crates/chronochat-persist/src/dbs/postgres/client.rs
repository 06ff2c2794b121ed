use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronochat_types::{RequestLog, SessionRecord, UsageCounter, UsageIncrement};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

use crate::analytics::AnalyticsStore;
use crate::error::{PersistError, Result};

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS user_usage_stats (
        subject_id    TEXT        NOT NULL,
        month_year    TEXT        NOT NULL,
        message_count BIGINT      NOT NULL DEFAULT 0,
        token_count   BIGINT      NOT NULL DEFAULT 0,
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (subject_id, month_year)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS usage_idempotency_keys (
        idempotency_key TEXT        PRIMARY KEY,
        subject_id      TEXT        NOT NULL,
        applied_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS api_logs (
        id          BIGSERIAL   PRIMARY KEY,
        subject_id  TEXT,
        operation   TEXT        NOT NULL,
        status      TEXT        NOT NULL,
        latency_ms  BIGINT      NOT NULL,
        error       TEXT,
        created_at  TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_sessions (
        subject_id       TEXT        NOT NULL,
        session_id       TEXT        NOT NULL,
        started_at       TIMESTAMPTZ NOT NULL,
        last_activity_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (subject_id, session_id)
    )"#,
];

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

/// Usage counters and request telemetry on PostgreSQL
pub struct PgAnalyticsStore {
    pool: PgPool,
}

impl PgAnalyticsStore {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the analytics tables when missing
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn increment_usage(&self, increment: &UsageIncrement) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "INSERT INTO usage_idempotency_keys (idempotency_key, subject_id) VALUES ($1, $2) \
             ON CONFLICT (idempotency_key) DO NOTHING",
        )
        .bind(&increment.idempotency_key)
        .bind(&increment.subject_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.commit().await?;
            debug!(key = %increment.idempotency_key, "Usage increment already applied");
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO user_usage_stats (subject_id, month_year, message_count, token_count, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (subject_id, month_year) DO UPDATE SET \
                message_count = user_usage_stats.message_count + EXCLUDED.message_count, \
                token_count = user_usage_stats.token_count + EXCLUDED.token_count, \
                updated_at = now()",
        )
        .bind(&increment.subject_id)
        .bind(&increment.period)
        .bind(to_i64(increment.delta.messages))
        .bind(to_i64(increment.delta.tokens))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn usage(&self, subject_id: &str, period: &str) -> Result<Option<UsageCounter>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT message_count, token_count FROM user_usage_stats \
             WHERE subject_id = $1 AND month_year = $2",
        )
        .bind(subject_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(messages, tokens)| UsageCounter {
            subject_id: subject_id.to_string(),
            period: period.to_string(),
            message_count: messages.max(0) as u64,
            token_count: tokens.max(0) as u64,
        }))
    }

    async fn record_request(&self, log: &RequestLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO api_logs (subject_id, operation, status, latency_ms, error, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&log.subject_id)
        .bind(&log.operation)
        .bind(&log.status)
        .bind(to_i64(log.latency_ms))
        .bind(&log.error)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_session(&self, session: &SessionRecord) -> Result<()> {
        let seen_at: DateTime<Utc> = session.seen_at;
        sqlx::query(
            "INSERT INTO user_sessions (subject_id, session_id, started_at, last_activity_at) \
             VALUES ($1, $2, $3, $3) \
             ON CONFLICT (subject_id, session_id) DO UPDATE SET \
                last_activity_at = GREATEST(user_sessions.last_activity_at, EXCLUDED.last_activity_at)",
        )
        .bind(&session.subject_id)
        .bind(&session.session_id)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
