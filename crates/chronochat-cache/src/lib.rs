pub mod error;
pub mod memory;
pub mod recent;
pub mod redis_cache;
pub mod traits;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use recent::{AppendOutcome, RecentMessages, RecentMessagesConfig};
pub use redis_cache::{RedisCache, RedisCacheConfig};
pub use traits::SessionCache;
