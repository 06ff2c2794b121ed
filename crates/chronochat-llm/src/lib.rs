pub mod config;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod traits;
pub mod types;

pub use config::{GeminiConfig, OpenAIConfig, ProviderConfig, ProviderDetails, ProviderFactory, ProviderType};
pub use error::ProviderError;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use traits::{
    Completion, CompletionProvider, GenerateOptions, GenerateRequest, Generation, TokenUsage,
};
pub use types::{Content, Message, Tool, ToolCall};
