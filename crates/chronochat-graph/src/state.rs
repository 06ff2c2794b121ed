use chronochat_llm::{Completion, Message as ProviderMessage, ToolCall};
use chronochat_types::{NewMessage, ToolTrace, TurnMode};
use tokio_util::sync::CancellationToken;

/// Where a turn is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Started,
    Generating,
    ToolDispatch,
    Finalized,
}

/// Working state of one turn; nothing here is durable until finalization
#[derive(Debug, Clone)]
pub struct TurnState {
    pub subject: String,
    pub thread_id: String,
    pub is_new_thread: bool,
    pub mode: TurnMode,
    pub phase: Phase,
    /// Provider history: system prompt, prior messages, then this turn
    pub history: Vec<ProviderMessage>,
    pub user_message: NewMessage,
    /// Tool result messages in dispatch order
    pub tool_messages: Vec<NewMessage>,
    pub tool_trace: Vec<ToolTrace>,
    pub tool_rounds: usize,
    pub last_completion: Option<Completion>,
    /// Model that produced the last completion
    pub model: Option<String>,
    pub provider_tokens: u64,
    /// Fires when the caller abandons the turn
    pub cancel: CancellationToken,
}

impl TurnState {
    pub fn new(
        subject: impl Into<String>,
        thread_id: impl Into<String>,
        is_new_thread: bool,
        mode: TurnMode,
        history: Vec<ProviderMessage>,
        user_message: NewMessage,
    ) -> Self {
        Self {
            subject: subject.into(),
            thread_id: thread_id.into(),
            is_new_thread,
            mode,
            phase: Phase::Started,
            history,
            user_message,
            tool_messages: Vec::new(),
            tool_trace: Vec::new(),
            tool_rounds: 0,
            last_completion: None,
            model: None,
            provider_tokens: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn record_completion(&mut self, completion: Completion, model: String) {
        self.history.push(completion.to_message());
        self.last_completion = Some(completion);
        self.model = Some(model);
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        !self.pending_tool_calls().is_empty()
    }

    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.last_completion
            .as_ref()
            .map(Completion::tool_calls)
            .unwrap_or(&[])
    }

    pub fn add_tool_result(&mut self, trace: ToolTrace, content: String, tokens: u32) {
        self.history
            .push(ProviderMessage::tool_result(&trace.call_id, content.clone()));
        self.tool_messages
            .push(NewMessage::tool(trace.clone(), content).with_tokens(tokens));
        self.tool_trace.push(trace);
    }

    /// Text of the last completion, if it had any
    pub fn final_text(&self) -> Option<&str> {
        self.last_completion
            .as_ref()
            .and_then(Completion::text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}
