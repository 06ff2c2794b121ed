use crate::error::CacheError;
use crate::traits::SessionCache;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache with the same contract as the Redis adapter
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    atomic_increment: bool,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            atomic_increment: true,
        }
    }

    /// A cache that reports no atomic increment, forcing callers onto CAS
    pub fn without_atomic_increment() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            atomic_increment: false,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_value(entries: &mut HashMap<String, Entry>, key: &str) -> Option<String> {
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        Ok(Self::live_value(&mut entries, key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        if !self.atomic_increment {
            return Err(CacheError::Unsupported("increment_with_ttl"));
        }
        let mut entries = self.entries.lock();
        let current = Self::live_value(&mut entries, key);
        let next = match current {
            Some(raw) => {
                let value: u64 = raw
                    .parse()
                    .map_err(|_| CacheError::Command(format!("value at {} is not an integer", key)))?;
                value + 1
            }
            None => 1,
        };
        // TTL is only set when the counter is created
        let expires_at = match entries.get(key) {
            Some(entry) => entry.expires_at,
            None => Instant::now() + ttl,
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock();
        let current = Self::live_value(&mut entries, key);
        if current.as_deref() != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: new.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    fn supports_atomic_increment(&self) -> bool {
        self.atomic_increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_keeps_first_ttl() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(10);
        assert_eq!(cache.increment_with_ttl("c", ttl).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.increment_with_ttl("c", ttl).await.unwrap(), 2);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.increment_with_ttl("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        assert!(cache.compare_and_set("k", None, "a", ttl).await.unwrap());
        assert!(!cache.compare_and_set("k", None, "b", ttl).await.unwrap());
        assert!(!cache.compare_and_set("k", Some("x"), "b", ttl).await.unwrap());
        assert!(cache.compare_and_set("k", Some("a"), "b", ttl).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_increment_unsupported() {
        let cache = MemoryCache::without_atomic_increment();
        assert!(!cache.supports_atomic_increment());
        assert!(matches!(
            cache.increment_with_ttl("c", Duration::from_secs(1)).await,
            Err(CacheError::Unsupported(_))
        ));
    }
}
