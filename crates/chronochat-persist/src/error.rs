use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[cfg(feature = "mongodb")]
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[cfg(feature = "postgres")]
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersistError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "mongodb")]
            PersistError::Database(e) => {
                e.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR)
                    || matches!(
                        *e.kind,
                        mongodb::error::ErrorKind::Io(_)
                            | mongodb::error::ErrorKind::ConnectionPoolCleared { .. }
                            | mongodb::error::ErrorKind::ServerSelection { .. }
                    )
            }
            #[cfg(feature = "postgres")]
            PersistError::Sql(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            PersistError::Connection(_) | PersistError::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
