use crate::error::CacheError;
use crate::traits::SessionCache;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const INCREMENT_WITH_TTL: &str = r#"
local value = redis.call("INCR", KEYS[1])
if value == 1 then
    redis.call("PEXPIRE", KEYS[1], ARGV[1])
end
return value
"#;

// ARGV: expected_present ("1"/"0"), expected, new, ttl_ms
const COMPARE_AND_SET: &str = r#"
local current = redis.call("GET", KEYS[1])
if ARGV[1] == "1" then
    if current ~= ARGV[2] then
        return 0
    end
elseif current then
    return 0
end
redis.call("SET", KEYS[1], ARGV[3], "PX", ARGV[4])
return 1
"#;

#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub url: String,
    /// Upper bound for every cache round trip
    pub op_timeout: Duration,
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            op_timeout: Duration::from_millis(250),
        }
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }
}

/// Redis-backed session cache
///
/// Created once at startup and shared; `ConnectionManager` reconnects on its
/// own and is cheap to clone per command.
/// Shared by every clone of a client, so closing one closes all of them
#[derive(Clone, Default)]
struct CloseGate(Arc<AtomicBool>);

impl CloseGate {
    fn close(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.0.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Redis-backed session cache
///
/// Clones share one multiplexed connection. After [`RedisCache::close`] every
/// clone fails with [`CacheError::Closed`]; the socket itself is released when
/// the last clone is dropped.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    gate: CloseGate,
    op_timeout: Duration,
    increment: Script,
    compare_and_set: Script,
}

impl RedisCache {
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let conn = tokio::time::timeout(config.op_timeout * 20, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(config.op_timeout * 20))??;

        info!("Connected to Redis");

        Ok(Self {
            conn,
            gate: CloseGate::default(),
            op_timeout: config.op_timeout,
            increment: Script::new(INCREMENT_WITH_TTL),
            compare_and_set: Script::new(COMPARE_AND_SET),
        })
    }

    /// Stop serving requests on every clone and release this handle
    pub async fn close(self) {
        if self.gate.close() {
            info!("Redis connection closed");
        }
    }

    /// Connection handle for one command
    fn conn(&self) -> Result<ConnectionManager, CacheError> {
        self.gate.check()?;
        Ok(self.conn.clone())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn()?;
        let value: Option<String> = self
            .bounded(redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn()?;
        let _: () = self
            .bounded(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn()?;
        let _: i64 = self
            .bounded(redis::cmd("DEL").arg(key).query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        let mut conn = self.conn()?;
        let mut invocation = self.increment.key(key);
        invocation.arg(ttl_millis(ttl));
        let value: u64 = self.bounded(invocation.invoke_async(&mut conn)).await?;
        Ok(value)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn()?;
        let mut invocation = self.compare_and_set.key(key);
        invocation
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or(""))
            .arg(new)
            .arg(ttl_millis(ttl));
        let swapped: i64 = self.bounded(invocation.invoke_async(&mut conn)).await?;
        Ok(swapped == 1)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn()?;
        let _: String = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}
