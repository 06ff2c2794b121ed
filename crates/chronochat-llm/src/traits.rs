use crate::error::ProviderError;
use crate::types::{Message, Tool, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Text-completion capability
///
/// One implementation per backend, selected at startup through
/// [`crate::ProviderFactory`]. Implementations perform a single HTTP attempt;
/// retry and timeout policy belongs to the caller.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short backend name recorded on persisted messages ("openai", "gemini")
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError>;
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub options: GenerateOptions,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// What the provider produced: a final answer or a batch of tool requests
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    ToolCalls {
        /// Optional text emitted alongside the tool requests
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl Completion {
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Completion::Text(_) => &[],
            Completion::ToolCalls { calls, .. } => calls,
        }
    }

    /// Any text the provider produced
    pub fn text(&self) -> Option<&str> {
        match self {
            Completion::Text(text) => Some(text),
            Completion::ToolCalls { content, .. } => content.as_deref(),
        }
    }

    /// Assistant message to replay in history
    pub fn to_message(&self) -> Message {
        match self {
            Completion::Text(text) => Message::ai(text.clone()),
            Completion::ToolCalls { content, calls } => {
                Message::ai_with_tools(content.clone(), calls.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub completion: Completion,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}
