use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chronochat_auth::{Partitioning, RateDecision, RateLimitConfig, RateLimiter};
use chronochat_cache::{CacheError, MemoryCache, SessionCache};
use std::sync::Arc;
use std::time::Duration;

// Aligned to a 60s bucket boundary
const BUCKET_START_MS: i64 = 60_000 * 28_333_334;

fn at(offset_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(BUCKET_START_MS + offset_ms).unwrap()
}

fn limiter(cache: Arc<dyn SessionCache>, partitioning: Partitioning) -> RateLimiter {
    RateLimiter::new(
        cache,
        RateLimitConfig {
            limit: 3,
            window: Duration::from_secs(60),
            partitioning,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_limit_within_one_bucket() {
    let limiter = limiter(Arc::new(MemoryCache::new()), Partitioning::Global);

    for expected in [2, 1, 0] {
        assert_eq!(
            limiter.check_at("u1", "chat", at(0)).await,
            RateDecision::Allowed { remaining: expected }
        );
    }
    assert_eq!(
        limiter.check_at("u1", "chat", at(0)).await,
        RateDecision::Limited {
            retry_after: Duration::from_secs(60)
        }
    );
    // other subjects are unaffected
    assert!(limiter.check_at("u2", "chat", at(0)).await.is_allowed());
}

#[tokio::test]
async fn test_previous_bucket_is_weighted_by_overlap() {
    let limiter = limiter(Arc::new(MemoryCache::new()), Partitioning::Global);
    for _ in 0..3 {
        assert!(limiter.check_at("u1", "chat", at(0)).await.is_allowed());
    }

    // halfway into the next bucket the previous three count as 1.5
    assert!(limiter.check_at("u1", "chat", at(90_000)).await.is_allowed());
    match limiter.check_at("u1", "chat", at(90_000)).await {
        RateDecision::Limited { retry_after } => {
            assert!(retry_after >= Duration::from_secs(9));
            assert!(retry_after <= Duration::from_secs(11));
        }
        other => panic!("expected limited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_per_endpoint_partitioning() {
    let limiter = limiter(Arc::new(MemoryCache::new()), Partitioning::PerEndpoint);
    for _ in 0..3 {
        assert!(limiter.check_at("u1", "chat", at(0)).await.is_allowed());
    }
    assert!(!limiter.check_at("u1", "chat", at(0)).await.is_allowed());
    assert!(limiter.check_at("u1", "search", at(0)).await.is_allowed());
}

#[tokio::test]
async fn test_cas_fallback_counts_like_increment() {
    let limiter = limiter(
        Arc::new(MemoryCache::without_atomic_increment()),
        Partitioning::Global,
    );
    for _ in 0..3 {
        assert!(limiter.check_at("u1", "chat", at(0)).await.is_allowed());
    }
    assert!(!limiter.check_at("u1", "chat", at(0)).await.is_allowed());
}

struct UnavailableCache;

#[async_trait]
impl SessionCache for UnavailableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Connection("refused".into()))
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Connection("refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Connection("refused".into()))
    }

    async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> Result<u64, CacheError> {
        Err(CacheError::Connection("refused".into()))
    }

    async fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&str>,
        _new: &str,
        _ttl: Duration,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Connection("refused".into()))
    }
}

/// Reads work, but every compare-and-set loses
struct ContendedCache(MemoryCache);

#[async_trait]
impl SessionCache for ContendedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.0.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.0.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.0.delete(key).await
    }

    async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> Result<u64, CacheError> {
        Err(CacheError::Unsupported("increment_with_ttl"))
    }

    async fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&str>,
        _new: &str,
        _ttl: Duration,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn supports_atomic_increment(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_cache_failure_fails_open() {
    let limiter = limiter(Arc::new(UnavailableCache), Partitioning::Global);
    for _ in 0..10 {
        assert_eq!(
            limiter.check_at("u1", "chat", at(0)).await,
            RateDecision::Allowed { remaining: 3 }
        );
    }
}

#[tokio::test]
async fn test_cas_exhaustion_fails_open() {
    let limiter = limiter(
        Arc::new(ContendedCache(MemoryCache::new())),
        Partitioning::Global,
    );
    for _ in 0..5 {
        assert!(limiter.check_at("u1", "chat", at(0)).await.is_allowed());
    }
}
