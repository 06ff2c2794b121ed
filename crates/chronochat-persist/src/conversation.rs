use crate::error::Result;
use async_trait::async_trait;
use chronochat_types::{Message, NewMessage, NewThread, SequenceRange, Thread};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListThreads {
    pub include_archived: bool,
    pub limit: i64,
    pub skip: u64,
}

impl Default for ListThreads {
    fn default() -> Self {
        Self {
            include_archived: false,
            limit: 50,
            skip: 0,
        }
    }
}

impl ListThreads {
    pub fn including_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    pub fn page(mut self, limit: i64, skip: u64) -> Self {
        self.limit = limit;
        self.skip = skip;
        self
    }
}

/// Durable conversation storage
///
/// Messages are append-only. `append_turn` is atomic per thread: every
/// reader observes either none or all of a turn's messages, with gapless
/// sequence numbers continuing from the thread's `message_count`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_thread(&self, thread: NewThread) -> Result<Thread>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// Append an ordered batch and bump the thread counters in one unit
    async fn append_turn(&self, thread_id: &str, messages: Vec<NewMessage>) -> Result<SequenceRange>;

    /// Newest `limit` messages in ascending sequence order
    async fn read_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Owner's threads, most recently updated first
    async fn list_threads(&self, owner_id: &str, options: ListThreads) -> Result<Vec<Thread>>;

    async fn rename_thread(&self, thread_id: &str, owner_id: &str, title: &str) -> Result<()>;

    async fn archive_thread(&self, thread_id: &str, owner_id: &str) -> Result<()>;

    /// Remove the thread and all of its messages
    async fn delete_thread(&self, thread_id: &str, owner_id: &str) -> Result<()>;

    /// Case-insensitive title search over the owner's threads
    async fn search_threads(&self, owner_id: &str, query: &str, limit: i64) -> Result<Vec<Thread>>;

    /// Recompute `message_count` and `total_tokens` from the stored messages
    async fn reconcile_counters(&self, thread_id: &str) -> Result<Thread>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
