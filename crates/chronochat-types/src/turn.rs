use serde::{Deserialize, Serialize};

use crate::message::{SequenceRange, ToolTrace};

/// Conversation mode, decides which tools are offered to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    #[default]
    Normal,
    Retrieval,
}

/// One inbound user utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnInput {
    /// `None` starts a new thread
    pub thread_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub mode: TurnMode,
}

impl TurnInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            text: text.into(),
            mode: TurnMode::default(),
        }
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_mode(mut self, mode: TurnMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Result of a finalized turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub assistant_text: String,
    pub thread_id: String,
    pub tool_trace: Vec<ToolTrace>,
    /// Set when the tool-call depth bound ended the turn early
    pub incomplete: bool,
    /// Sequence numbers assigned to the persisted turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceRange>,
    pub total_tokens: u64,
}
