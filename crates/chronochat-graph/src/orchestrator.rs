use crate::config::{OrchestratorConfig, INCOMPLETE_FALLBACK};
use crate::error::TurnError;
use crate::history::to_provider_history;
use crate::locks::ThreadLocks;
use crate::node::{Node, NodeType};
use crate::nodes::{LLMNode, ToolNode};
use crate::router::{NextNode, Router, SimpleRouter};
use crate::state::{Phase, TurnState};
use crate::tokens::TokenCounter;
use chrono::Utc;
use chronochat_cache::{AppendOutcome, CacheError, RecentMessages};
use chronochat_llm::{CompletionProvider, Message as ProviderMessage};
use chronochat_persist::{AnalyticsEvent, AnalyticsWriter, ConversationStore};
use chronochat_types::{
    Message, NewMessage, NewThread, TurnInput, TurnOutcome, UsageDelta, UsageIncrement,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives one turn from the user's utterance to a persisted answer
///
/// Each turn runs on its own task holding the thread's busy guard. When the
/// caller's token is cancelled the caller gets `Cancelled` right away; the
/// task lets in-flight calls finish, then stops before anything is persisted.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) provider: Arc<dyn CompletionProvider>,
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) recent: RecentMessages,
    pub(crate) analytics: Arc<AnalyticsWriter>,
    pub(crate) tokens: TokenCounter,
    pub(crate) locks: ThreadLocks,
    pub(crate) llm_node: LLMNode,
    pub(crate) tool_node: ToolNode,
    pub(crate) router: SimpleRouter,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn builder() -> crate::builder::OrchestratorBuilder {
        crate::builder::OrchestratorBuilder::new()
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Whether a turn is currently running on the thread
    pub fn is_busy(&self, thread_id: &str) -> bool {
        self.inner.locks.is_busy(thread_id)
    }

    pub async fn process_turn(
        &self,
        subject: &str,
        input: TurnInput,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let thread_id = input
            .thread_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let guard = self
            .inner
            .locks
            .try_acquire(&thread_id)
            .ok_or_else(|| TurnError::ThreadBusy {
                thread_id: thread_id.clone(),
                retry_after: self.inner.config.busy_retry_after,
            })?;

        let inner = Arc::clone(&self.inner);
        let subject = subject.to_string();
        let task_cancel = cancel.clone();
        let task_thread = thread_id.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner.run(subject, task_thread, input, task_cancel).await
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(thread_id = %thread_id, "Turn cancelled by caller");
                Err(TurnError::Cancelled)
            }
            joined = task => joined.unwrap_or_else(|e| {
                error!(thread_id = %thread_id, error = %e, "Turn task failed");
                Err(TurnError::Internal(format!("turn task failed: {}", e)))
            }),
        }
    }
}

impl Inner {
    async fn run(
        &self,
        subject: String,
        thread_id: String,
        input: TurnInput,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();
        let mut state = self
            .start(&subject, &thread_id, &input)
            .await?
            .with_cancellation(cancel.clone());

        let mut current = NodeType::LLM;
        loop {
            if cancel.is_cancelled() {
                debug!(thread_id = %thread_id, "Stopping cancelled turn");
                return Err(TurnError::Cancelled);
            }

            match current {
                NodeType::LLM => self.llm_node.execute(&mut state).await?,
                NodeType::Tool => self.tool_node.execute(&mut state).await?,
            }

            match self.router.next(&state, current) {
                NextNode::End => break,
                NextNode::LLM => current = NodeType::LLM,
                NextNode::Tool => current = NodeType::Tool,
            }
        }

        self.finalize(state, &cancel, started).await
    }

    async fn start(&self, subject: &str, thread_id: &str, input: &TurnInput) -> Result<TurnState, TurnError> {
        let is_new_thread = input.thread_id.is_none();

        let prior = if is_new_thread {
            Vec::new()
        } else {
            let thread = self
                .store_call("get_thread", self.store.get_thread(thread_id))
                .await?
                .ok_or_else(|| TurnError::ThreadNotFound(thread_id.to_string()))?;
            if !thread.is_owned_by(subject) {
                return Err(TurnError::Forbidden(thread_id.to_string()));
            }
            self.load_recent(thread_id).await?
        };

        let mut history = to_provider_history(&self.config.system_prompt, &prior);
        history.push(ProviderMessage::human(input.text.clone()));

        let user_message = NewMessage::user(&input.text).with_tokens(self.tokens.count(&input.text));
        debug!(thread_id = %thread_id, prior = prior.len(), is_new_thread, "Turn started");

        Ok(TurnState::new(
            subject,
            thread_id,
            is_new_thread,
            input.mode,
            history,
            user_message,
        ))
    }

    /// Cached window first; on a miss read the store and backfill
    async fn load_recent(&self, thread_id: &str) -> Result<Vec<Message>, TurnError> {
        let limit = self.config.history_limit;
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(Some(cached)) = self.cache_call("load_recent", self.recent.load(thread_id)).await {
            debug!(thread_id = %thread_id, cached = cached.len(), "Recent messages served from cache");
            let start = cached.len().saturating_sub(limit);
            return Ok(cached[start..].to_vec());
        }

        let messages = self
            .store_call("read_recent_messages", self.store.read_recent_messages(thread_id, limit))
            .await?;
        self.cache_call("backfill_recent", self.recent.backfill(thread_id, &messages))
            .await;
        Ok(messages)
    }

    async fn finalize(
        &self,
        mut state: TurnState,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<TurnOutcome, TurnError> {
        if cancel.is_cancelled() {
            debug!(thread_id = %state.thread_id, "Discarding cancelled turn before persistence");
            return Err(TurnError::Cancelled);
        }
        state.phase = Phase::Finalized;

        let incomplete = state.has_pending_tool_calls();
        let assistant_text = match state.final_text() {
            Some(text) => text.to_string(),
            None if incomplete => INCOMPLETE_FALLBACK.to_string(),
            None => String::new(),
        };
        if incomplete {
            warn!(
                thread_id = %state.thread_id,
                rounds = state.tool_rounds,
                "Tool round limit reached, finalizing partial answer"
            );
        }

        let model = state
            .model
            .clone()
            .unwrap_or_else(|| self.provider.model().to_string());
        let assistant = NewMessage::assistant(&assistant_text)
            .with_tokens(self.tokens.count(&assistant_text))
            .with_source(self.provider.name(), model);

        let mut batch = Vec::with_capacity(state.tool_messages.len() + 2);
        batch.push(state.user_message.clone());
        batch.extend(state.tool_messages.iter().cloned());
        batch.push(assistant);
        let total_tokens: u64 = batch.iter().map(|m| u64::from(m.token_count)).sum();

        let mut outcome = TurnOutcome {
            assistant_text,
            thread_id: state.thread_id.clone(),
            tool_trace: state.tool_trace.clone(),
            incomplete,
            sequence: None,
            total_tokens,
        };

        if state.is_new_thread {
            let thread = NewThread::new(&state.subject)
                .with_id(&state.thread_id)
                .with_title_from(&state.user_message.content);
            if let Err(e) = self.store_call("create_thread", self.store.create_thread(thread)).await {
                return Err(persisted_partially(outcome, e));
            }
        }

        let range = match self
            .store_call("append_turn", self.store.append_turn(&state.thread_id, batch.clone()))
            .await
        {
            Ok(range) => range,
            Err(e) => return Err(persisted_partially(outcome, e)),
        };
        outcome.sequence = Some(range);

        let persisted: Vec<Message> = batch
            .into_iter()
            .zip(range.iter())
            .map(|(message, sequence)| message.into_message(&state.thread_id, sequence))
            .collect();
        match self
            .cache_call("append_recent", self.recent.append(&state.thread_id, &persisted))
            .await
        {
            Some(AppendOutcome::Appended) | Some(AppendOutcome::NotCached) => {}
            Some(AppendOutcome::Invalidated) => {
                debug!(thread_id = %state.thread_id, "Recent-messages cache invalidated");
            }
            None => {
                self.cache_call("invalidate_recent", self.recent.invalidate_thread(&state.thread_id))
                    .await;
            }
        }

        let usage = UsageIncrement::for_turn(
            &state.subject,
            &state.thread_id,
            range.first,
            UsageDelta::new(range.len(), total_tokens),
            Utc::now(),
        );
        self.analytics.enqueue(AnalyticsEvent::Usage(usage));

        info!(
            thread_id = %state.thread_id,
            first = range.first,
            last = range.last,
            tool_calls = state.tool_trace.len(),
            incomplete,
            total_tokens,
            provider_tokens = state.provider_tokens,
            latency_ms = started.elapsed().as_millis() as u64,
            "Turn finalized"
        );
        Ok(outcome)
    }

    async fn store_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, TurnError>
    where
        F: Future<Output = chronochat_persist::Result<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(TurnError::from),
            Err(_) => Err(TurnError::store_timeout(operation)),
        }
    }

    /// Cache failures never fail a turn
    async fn cache_call<T, F>(&self, operation: &'static str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.config.cache_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(operation, error = %e, "Session cache call failed");
                None
            }
            Err(_) => {
                warn!(operation, "Session cache call timed out");
                None
            }
        }
    }
}

fn persisted_partially(outcome: TurnOutcome, cause: TurnError) -> TurnError {
    error!(thread_id = %outcome.thread_id, error = %cause, "Generated turn could not be persisted");
    TurnError::PersistedPartially {
        outcome: Box::new(outcome),
        message: cause.to_string(),
    }
}
