use chrono::{DateTime, Utc};
use chronochat_cache::{CacheError, SessionCache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const GLOBAL_SCOPE: &str = "global";

/// How request counts are partitioned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// One budget per subject across all endpoints
    #[default]
    Global,
    /// A separate budget per subject and endpoint
    PerEndpoint,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u32,
    pub window: Duration,
    pub partitioning: Partitioning,
    /// Compare-and-set attempts when the cache has no atomic increment
    pub cas_attempts: u32,
    pub key_prefix: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 60,
            window: Duration::from_secs(60),
            partitioning: Partitioning::Global,
            cas_attempts: 3,
            key_prefix: "ratelimit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Sliding-window limiter over fixed cache buckets
///
/// The estimate for a request is the previous bucket's count weighted by how
/// much of it still overlaps the window, plus the current bucket's count.
/// Cache failures and CAS exhaustion fail open.
pub struct RateLimiter {
    cache: Arc<dyn SessionCache>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn SessionCache>, config: RateLimitConfig) -> Self {
        Self { cache, config }
    }

    pub async fn check(&self, subject: &str) -> RateDecision {
        self.check_at(subject, GLOBAL_SCOPE, Utc::now()).await
    }

    pub async fn check_scoped(&self, subject: &str, endpoint: &str) -> RateDecision {
        self.check_at(subject, endpoint, Utc::now()).await
    }

    pub async fn check_at(&self, subject: &str, endpoint: &str, now: DateTime<Utc>) -> RateDecision {
        let scope = match self.config.partitioning {
            Partitioning::Global => GLOBAL_SCOPE,
            Partitioning::PerEndpoint => endpoint,
        };

        let window_ms = (self.config.window.as_millis() as u64).max(1);
        let now_ms = now.timestamp_millis().max(0) as u64;
        let bucket = now_ms / window_ms;
        let elapsed_ms = now_ms % window_ms;

        let current_key = self.bucket_key(scope, subject, bucket);
        let previous_key = self.bucket_key(scope, subject, bucket.saturating_sub(1));

        let previous = match self.read_count(&previous_key).await {
            Ok(count) => count,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Rate limit read failed, allowing request");
                return self.fail_open();
            }
        };

        let current = match self.increment(&current_key).await {
            Ok(Some(count)) => count,
            Ok(None) => {
                warn!(subject = %subject, attempts = self.config.cas_attempts, "Rate limit CAS exhausted, allowing request");
                return self.fail_open();
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "Rate limit increment failed, allowing request");
                return self.fail_open();
            }
        };

        let overlap = 1.0 - (elapsed_ms as f64 / window_ms as f64);
        let estimate = previous as f64 * overlap + current as f64;
        let limit = self.config.limit as f64;

        debug!(subject = %subject, scope, previous, current, estimate, "Rate limit estimate");

        if estimate <= limit {
            RateDecision::Allowed {
                remaining: (limit - estimate).floor().max(0.0) as u32,
            }
        } else {
            RateDecision::Limited {
                retry_after: self.retry_after(previous, current, elapsed_ms, window_ms),
            }
        }
    }

    /// Time until the weighted estimate drops back under the limit
    fn retry_after(&self, previous: u64, current: u64, elapsed_ms: u64, window_ms: u64) -> Duration {
        let limit = self.config.limit as f64;
        let until_bucket_end = window_ms - elapsed_ms;

        let wait_ms = if (current as f64) < limit && previous > 0 {
            // previous * (1 - (elapsed + t) / window) + current <= limit
            let needed = window_ms as f64 * (1.0 - (limit - current as f64) / previous as f64);
            (needed - elapsed_ms as f64).ceil().max(1.0) as u64
        } else {
            until_bucket_end
        };

        Duration::from_millis(wait_ms.min(until_bucket_end).max(1))
    }

    fn fail_open(&self) -> RateDecision {
        RateDecision::Allowed {
            remaining: self.config.limit,
        }
    }

    async fn read_count(&self, key: &str) -> Result<u64, CacheError> {
        Ok(self
            .cache
            .get(key)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    /// New count of the bucket, or `None` when the CAS loop ran out of attempts
    async fn increment(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let ttl = self.config.window * 2;

        if self.cache.supports_atomic_increment() {
            return self.cache.increment_with_ttl(key, ttl).await.map(Some);
        }

        for _ in 0..self.config.cas_attempts {
            let current = self.cache.get(key).await?;
            let count: u64 = current.as_deref().and_then(|raw| raw.parse().ok()).unwrap_or(0);
            let next = (count + 1).to_string();
            if self
                .cache
                .compare_and_set(key, current.as_deref(), &next, ttl)
                .await?
            {
                return Ok(Some(count + 1));
            }
        }
        Ok(None)
    }

    fn bucket_key(&self, scope: &str, subject: &str, bucket: u64) -> String {
        format!("{}:{}:{}:{}", self.config.key_prefix, scope, subject, bucket)
    }
}
