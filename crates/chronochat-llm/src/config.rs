// Configuration layer for provider-agnostic client creation

use crate::error::ProviderError;
use crate::traits::CompletionProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    OpenAI,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    /// Defaults to https://api.openai.com/v1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Defaults to https://generativelanguage.googleapis.com/v1beta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderDetails {
    OpenAI(OpenAIConfig),
    Gemini(GeminiConfig),
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub details: ProviderDetails,
    /// HTTP timeout applied to every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::OpenAI(OpenAIConfig::new(api_key, model)),
            request_timeout_secs: None,
        }
    }

    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Gemini(GeminiConfig::new(api_key, model)),
            request_timeout_secs: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn provider_type(&self) -> ProviderType {
        match self.details {
            ProviderDetails::OpenAI(_) => ProviderType::OpenAI,
            ProviderDetails::Gemini(_) => ProviderType::Gemini,
        }
    }

    pub fn model(&self) -> &str {
        match &self.details {
            ProviderDetails::OpenAI(c) => &c.model,
            ProviderDetails::Gemini(c) => &c.model,
        }
    }
}

/// Factory for creating completion providers from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: ProviderConfig) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);

        match config.details {
            ProviderDetails::OpenAI(openai) => {
                let mut client = crate::openai::OpenAIClient::new(openai.api_key, openai.model)?;
                if let Some(base_url) = openai.base_url {
                    client = client.with_base_url(base_url);
                }
                if let Some(timeout) = timeout {
                    client = client.with_timeout(timeout);
                }
                Ok(Arc::new(client))
            }
            ProviderDetails::Gemini(gemini) => {
                let mut client = crate::gemini::GeminiClient::new(gemini.api_key, gemini.model)?;
                if let Some(base_url) = gemini.base_url {
                    client = client.with_base_url(base_url);
                }
                if let Some(timeout) = timeout {
                    client = client.with_timeout(timeout);
                }
                Ok(Arc::new(client))
            }
        }
    }
}
