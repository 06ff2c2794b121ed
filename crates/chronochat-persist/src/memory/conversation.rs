use crate::conversation::{ConversationStore, ListThreads};
use crate::error::{PersistError, Result};
use async_trait::async_trait;
use chrono::Utc;
use chronochat_types::{Message, NewMessage, NewThread, SequenceRange, Thread};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct State {
    threads: HashMap<String, Thread>,
    messages: HashMap<String, Vec<Message>>,
}

/// In-process conversation store; one lock makes every append atomic
#[derive(Default)]
pub struct MemoryConversationStore {
    state: Mutex<State>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored message of a thread, in sequence order
    pub fn messages(&self, thread_id: &str) -> Vec<Message> {
        self.state
            .lock()
            .messages
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn thread_count(&self) -> usize {
        self.state.lock().threads.len()
    }
}

fn owned<'a>(state: &'a mut State, thread_id: &str, owner_id: &str) -> Result<&'a mut Thread> {
    state
        .threads
        .get_mut(thread_id)
        .filter(|t| t.is_owned_by(owner_id))
        .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_thread(&self, thread: NewThread) -> Result<Thread> {
        let thread = thread.into_thread(Utc::now());
        let mut state = self.state.lock();
        if state.threads.contains_key(&thread.id) {
            return Err(PersistError::InvalidInput(format!("thread {} already exists", thread.id)));
        }
        state.threads.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.state.lock().threads.get(thread_id).cloned())
    }

    async fn append_turn(&self, thread_id: &str, messages: Vec<NewMessage>) -> Result<SequenceRange> {
        if messages.is_empty() {
            return Err(PersistError::InvalidInput("cannot append an empty turn".into()));
        }

        let mut state = self.state.lock();
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;

        let range = SequenceRange::following(thread.message_count, messages.len() as u64);
        let tokens: u64 = messages.iter().map(|m| m.token_count as u64).sum();
        thread.message_count = range.last;
        thread.total_tokens += tokens;
        thread.updated_at = Utc::now();

        let stored = state.messages.entry(thread_id.to_string()).or_default();
        stored.extend(
            messages
                .into_iter()
                .zip(range.iter())
                .map(|(message, sequence)| message.into_message(thread_id, sequence)),
        );
        Ok(range)
    }

    async fn read_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        let state = self.state.lock();
        let messages = state.messages.get(thread_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn list_threads(&self, owner_id: &str, options: ListThreads) -> Result<Vec<Thread>> {
        let state = self.state.lock();
        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.is_owned_by(owner_id) && (options.include_archived || !t.archived))
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads
            .into_iter()
            .skip(options.skip as usize)
            .take(options.limit.max(0) as usize)
            .collect())
    }

    async fn rename_thread(&self, thread_id: &str, owner_id: &str, title: &str) -> Result<()> {
        let mut state = self.state.lock();
        let thread = owned(&mut state, thread_id, owner_id)?;
        thread.title = Some(title.to_string());
        thread.updated_at = Utc::now();
        Ok(())
    }

    async fn archive_thread(&self, thread_id: &str, owner_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let thread = owned(&mut state, thread_id, owner_id)?;
        thread.archived = true;
        thread.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str, owner_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        owned(&mut state, thread_id, owner_id)?;
        state.threads.remove(thread_id);
        state.messages.remove(thread_id);
        Ok(())
    }

    async fn search_threads(&self, owner_id: &str, query: &str, limit: i64) -> Result<Vec<Thread>> {
        let needle = query.to_lowercase();
        let state = self.state.lock();
        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.is_owned_by(owner_id))
            .filter(|t| {
                t.title
                    .as_deref()
                    .is_some_and(|title| title.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        threads.truncate(limit.max(0) as usize);
        Ok(threads)
    }

    async fn reconcile_counters(&self, thread_id: &str) -> Result<Thread> {
        let mut state = self.state.lock();
        let (count, tokens) = state
            .messages
            .get(thread_id)
            .map(|m| (m.len() as u64, m.iter().map(|m| m.token_count as u64).sum::<u64>()))
            .unwrap_or((0, 0));
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        thread.message_count = count;
        thread.total_tokens = tokens;
        Ok(thread.clone())
    }
}
