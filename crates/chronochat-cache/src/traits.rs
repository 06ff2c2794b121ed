use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Shared key-value cache with TTLs
///
/// Mutations are limited to atomic primitives so that concurrent writers
/// never interleave a read-modify-write.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Atomically increment an integer counter, setting `ttl` when the key is
    /// created. Returns the new value.
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, CacheError>;

    /// Replace the value only when the current one equals `expected`
    /// (`None` meaning absent). Returns whether the swap happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Whether `increment_with_ttl` is available; callers fall back to
    /// `compare_and_set` otherwise
    fn supports_atomic_increment(&self) -> bool {
        true
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
