use async_trait::async_trait;
use chrono::Utc;
use chronochat_types::{Message, NewMessage, NewThread, SequenceRange, Thread};
use mongodb::bson::doc;
use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationStore, ListThreads};
use crate::dbs::mongo::models::{MongoMessage, MongoThread};
use crate::dbs::mongo::repositories::{MongoMessageRepository, MongoThreadRepository};
use crate::error::{PersistError, Result};

const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub server_selection_timeout: Duration,
    pub connect_timeout: Duration,
}

impl MongoConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            server_selection_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Conversation store on MongoDB
///
/// Turns are appended in a multi-document transaction, which requires a
/// replica set or sharded deployment.
pub struct MongoConversationStore {
    client: Client,
    database: String,
    threads: MongoThreadRepository,
    messages: MongoMessageRepository,
}

impl MongoConversationStore {
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        options.server_selection_timeout = Some(config.server_selection_timeout);
        options.connect_timeout = Some(config.connect_timeout);
        options.app_name = Some("chronochat".to_string());

        let client = Client::with_options(options).map_err(|e| PersistError::Connection(e.to_string()))?;
        let store = Self {
            threads: MongoThreadRepository::new(&client, &config.database),
            messages: MongoMessageRepository::new(&client, &config.database),
            database: config.database.clone(),
            client,
        };

        store.threads.ensure_indexes().await?;
        store.messages.ensure_indexes().await?;
        info!(database = %config.database, "Connected to MongoDB");
        Ok(store)
    }

    /// One transaction attempt. `None` means the thread does not exist.
    async fn append_in_session(
        &self,
        session: &mut ClientSession,
        thread_id: &str,
        messages: &[NewMessage],
    ) -> mongodb::error::Result<Option<SequenceRange>> {
        session.start_transaction().await?;

        let count = messages.len() as i64;
        let tokens: i64 = messages.iter().map(|m| m.token_count as i64).sum();

        let Some(thread) = self
            .threads
            .reserve_sequences(session, thread_id, count, tokens)
            .await?
        else {
            session.abort_transaction().await?;
            return Ok(None);
        };

        let last = thread.message_count.max(0) as u64;
        let range = SequenceRange::new(last + 1 - count as u64, last);

        let documents: Vec<MongoMessage> = messages
            .iter()
            .cloned()
            .zip(range.iter())
            .map(|(message, sequence)| message.into_message(thread_id, sequence).into())
            .collect();
        self.messages.insert_batch(session, &documents).await?;

        let mut commits = 0;
        loop {
            commits += 1;
            match session.commit_transaction().await {
                Ok(()) => return Ok(Some(range)),
                Err(e) if should_retry_commit(&e, commits) => {
                    warn!(thread_id = %thread_id, attempt = commits, "Commit result unknown, retrying commit");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn should_retry_commit(error: &mongodb::error::Error, attempt: u32) -> bool {
    commit_retry_allowed(error.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT), attempt)
}

/// `attempt` counts commits already tried, starting at 1
fn commit_retry_allowed(result_unknown: bool, attempt: u32) -> bool {
    result_unknown && attempt < MAX_TRANSACTION_ATTEMPTS
}

fn escape_regex(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl ConversationStore for MongoConversationStore {
    async fn create_thread(&self, thread: NewThread) -> Result<Thread> {
        let thread = thread.into_thread(Utc::now());
        self.threads.insert(&MongoThread::from(thread.clone())).await?;
        debug!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.get(thread_id).await?.map(Thread::from))
    }

    async fn append_turn(&self, thread_id: &str, messages: Vec<NewMessage>) -> Result<SequenceRange> {
        if messages.is_empty() {
            return Err(PersistError::InvalidInput("cannot append an empty turn".into()));
        }

        let mut session = self.client.start_session().await?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.append_in_session(&mut session, thread_id, &messages).await {
                Ok(Some(range)) => {
                    debug!(thread_id = %thread_id, first = range.first, last = range.last, "Appended turn");
                    return Ok(range);
                }
                Ok(None) => return Err(PersistError::ThreadNotFound(thread_id.to_string())),
                Err(e) => {
                    // no-op error when the transaction already ended
                    let _ = session.abort_transaction().await;
                    if e.contains_label(TRANSIENT_TRANSACTION_ERROR) && attempt < MAX_TRANSACTION_ATTEMPTS {
                        warn!(thread_id = %thread_id, attempt, error = %e, "Transient transaction error, retrying turn");
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    async fn read_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let messages = self.messages.recent(thread_id, limit as i64).await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn list_threads(&self, owner_id: &str, options: ListThreads) -> Result<Vec<Thread>> {
        let threads = self.threads.list(owner_id, options).await?;
        Ok(threads.into_iter().map(Thread::from).collect())
    }

    async fn rename_thread(&self, thread_id: &str, owner_id: &str, title: &str) -> Result<()> {
        if self
            .threads
            .update_owned(thread_id, owner_id, doc! { "title": title })
            .await?
        {
            Ok(())
        } else {
            Err(PersistError::ThreadNotFound(thread_id.to_string()))
        }
    }

    async fn archive_thread(&self, thread_id: &str, owner_id: &str) -> Result<()> {
        if self
            .threads
            .update_owned(thread_id, owner_id, doc! { "archived": true })
            .await?
        {
            Ok(())
        } else {
            Err(PersistError::ThreadNotFound(thread_id.to_string()))
        }
    }

    async fn delete_thread(&self, thread_id: &str, owner_id: &str) -> Result<()> {
        if !self.threads.delete_owned(thread_id, owner_id).await? {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        let removed = self.messages.delete_for_thread(thread_id).await?;
        debug!(thread_id = %thread_id, messages = removed, "Deleted thread");
        Ok(())
    }

    async fn search_threads(&self, owner_id: &str, query: &str, limit: i64) -> Result<Vec<Thread>> {
        let threads = self
            .threads
            .search(owner_id, &escape_regex(query), limit)
            .await?;
        Ok(threads.into_iter().map(Thread::from).collect())
    }

    async fn reconcile_counters(&self, thread_id: &str) -> Result<Thread> {
        let (count, tokens) = self.messages.totals(thread_id).await?;
        self.threads
            .set_counters(thread_id, count, tokens)
            .await?
            .map(Thread::from)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}
