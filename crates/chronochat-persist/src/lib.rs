pub mod analytics;
pub mod conversation;
pub mod dbs;
pub mod error;
pub mod memory;
pub mod writer;

pub use analytics::AnalyticsStore;
pub use conversation::{ConversationStore, ListThreads};
pub use error::{PersistError, Result};
pub use memory::{MemoryAnalyticsStore, MemoryConversationStore};
pub use writer::{AnalyticsEvent, AnalyticsWriter, AnalyticsWriterConfig};

#[cfg(feature = "mongodb")]
pub use dbs::mongo::{MongoConfig, MongoConversationStore};
#[cfg(feature = "postgres")]
pub use dbs::postgres::{PgAnalyticsStore, PostgresConfig};
