use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cache command failed: {0}")]
    Command(String),

    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(String),

    #[error("operation not supported by this cache: {0}")]
    Unsupported(&'static str),

    #[error("cache client has been closed")]
    Closed,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}
