use crate::error::CacheError;
use crate::traits::SessionCache;
use chronochat_types::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RecentMessagesConfig {
    pub key_prefix: String,
    /// Maximum messages kept per thread
    pub capacity: usize,
    pub ttl: Duration,
    pub cas_attempts: u32,
}

impl Default for RecentMessagesConfig {
    fn default() -> Self {
        Self {
            key_prefix: "recent".to_string(),
            capacity: 20,
            ttl: Duration::from_secs(3600),
            cas_attempts: 3,
        }
    }
}

/// Result of a write-through append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Nothing cached for the thread; the next read backfills from the store
    NotCached,
    /// Cached window was stale or contended and has been dropped
    Invalidated,
}

/// Read-through window over the most recent messages of each thread
///
/// The stored value is a JSON array ordered by `sequence`. The conversation
/// store stays the source of truth: any doubt about the cached window leads to
/// invalidation rather than repair.
#[derive(Clone)]
pub struct RecentMessages {
    cache: Arc<dyn SessionCache>,
    config: RecentMessagesConfig,
}

impl RecentMessages {
    pub fn new(cache: Arc<dyn SessionCache>, config: RecentMessagesConfig) -> Self {
        Self { cache, config }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    fn key(&self, thread_id: &str) -> String {
        format!("{}:{}", self.config.key_prefix, thread_id)
    }

    /// Cached window for the thread; undecodable entries count as misses
    pub async fn load(&self, thread_id: &str) -> Result<Option<Vec<Message>>, CacheError> {
        let key = self.key(thread_id);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => Ok(Some(messages)),
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Dropping undecodable recent-messages entry");
                self.cache.delete(&key).await?;
                Ok(None)
            }
        }
    }

    /// Overwrite the window, keeping only the newest `capacity` messages
    pub async fn store(&self, thread_id: &str, messages: &[Message]) -> Result<(), CacheError> {
        let window = self.trim(messages);
        let encoded = serde_json::to_string(window)?;
        self.cache
            .set_with_ttl(&self.key(thread_id), &encoded, self.config.ttl)
            .await
    }

    /// Seed the window after a miss; an entry written in the meantime wins.
    /// Returns whether the window was written.
    pub async fn backfill(&self, thread_id: &str, messages: &[Message]) -> Result<bool, CacheError> {
        let encoded = serde_json::to_string(self.trim(messages))?;
        let written = self
            .cache
            .compare_and_set(&self.key(thread_id), None, &encoded, self.config.ttl)
            .await?;
        if !written {
            debug!(thread_id = %thread_id, "Recent-messages entry appeared during backfill, keeping it");
        }
        Ok(written)
    }

    /// Append newly persisted messages with a bounded compare-and-set loop
    pub async fn append(
        &self,
        thread_id: &str,
        appended: &[Message],
    ) -> Result<AppendOutcome, CacheError> {
        let key = self.key(thread_id);

        for attempt in 1..=self.config.cas_attempts {
            let Some(current_raw) = self.cache.get(&key).await? else {
                return Ok(AppendOutcome::NotCached);
            };

            let mut window: Vec<Message> = match serde_json::from_str(&current_raw) {
                Ok(window) => window,
                Err(_) => return self.invalidate(&key).await,
            };

            let last_cached = window.last().map(|m| m.sequence).unwrap_or(0);
            let fresh: Vec<&Message> = appended.iter().filter(|m| m.sequence > last_cached).collect();
            if fresh.is_empty() {
                return Ok(AppendOutcome::Appended);
            }
            // A gap means another writer's turn never reached the cache
            if !window.is_empty() && fresh[0].sequence != last_cached + 1 {
                return self.invalidate(&key).await;
            }

            window.extend(fresh.into_iter().cloned());
            let encoded = serde_json::to_string(self.trim(&window))?;

            if self
                .cache
                .compare_and_set(&key, Some(&current_raw), &encoded, self.config.ttl)
                .await?
            {
                return Ok(AppendOutcome::Appended);
            }
            debug!(thread_id = %thread_id, attempt, "Recent-messages CAS lost, retrying");
        }

        warn!(thread_id = %thread_id, attempts = self.config.cas_attempts, "Recent-messages CAS exhausted, invalidating");
        self.invalidate(&key).await
    }

    pub async fn invalidate_thread(&self, thread_id: &str) -> Result<(), CacheError> {
        self.cache.delete(&self.key(thread_id)).await
    }

    async fn invalidate(&self, key: &str) -> Result<AppendOutcome, CacheError> {
        self.cache.delete(key).await?;
        Ok(AppendOutcome::Invalidated)
    }

    fn trim<'a>(&self, messages: &'a [Message]) -> &'a [Message] {
        let start = messages.len().saturating_sub(self.config.capacity);
        &messages[start..]
    }
}
