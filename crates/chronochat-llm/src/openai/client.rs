// OpenAI Chat Completions backend

use crate::error::ProviderError;
use crate::traits::{Completion, CompletionProvider, GenerateRequest, Generation, TokenUsage};
use crate::types::{Content, Message, ToolCall};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Option<Duration>,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| ProviderError::InvalidRequest("invalid API key format".into()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
            timeout: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_chat_request(&self, request: &GenerateRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(convert_message).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(temp) = request.options.temperature {
                obj.insert("temperature".to_string(), json!(temp));
            }
            if let Some(max_tokens) = request.options.max_tokens {
                obj.insert("max_tokens".to_string(), json!(max_tokens));
            }
            if !request.tools.is_empty() {
                obj.insert("tools".to_string(), json!(request.tools));
                obj.insert("tool_choice".to_string(), json!("auto"));
            }
        }

        body
    }
}

fn convert_message(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({
            "role": "system",
            "content": convert_content(content),
        }),
        Message::Human { content } => json!({
            "role": "user",
            "content": convert_content(content),
        }),
        Message::AI {
            content,
            tool_calls,
        } => {
            let mut msg = json!({
                "role": "assistant",
                "content": content.as_ref().map(convert_content).unwrap_or(Value::Null),
            });
            if let (Some(calls), Some(obj)) = (tool_calls, msg.as_object_mut()) {
                obj.insert("tool_calls".to_string(), json!(calls));
            }
            msg
        }
        Message::Tool {
            tool_call_id,
            content,
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": convert_content(content),
        }),
    }
}

fn convert_content(content: &Content) -> Value {
    match content {
        Content::Text(text) => json!(text),
        Content::Parts(_) => json!(content.to_plain()),
    }
}

#[async_trait]
impl CompletionProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_request(&request);

        tracing::debug!(model = %self.model, messages = request.messages.len(), tools = request.tools.len(), "openai generate");

        let mut builder = self.http_client.post(&url).json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(ProviderError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &text));
        }

        let parsed: OpenAIChatResponse = response.json().await.map_err(ProviderError::from_reqwest)?;
        parsed.into_generation(&self.model)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIChatResponse {
    fn into_generation(self, requested_model: &str) -> Result<Generation, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("response has no choices".into()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::ContentPolicy(
                "completion stopped by content filter".into(),
            ));
        }

        let calls = choice.message.tool_calls.unwrap_or_default();
        let completion = if calls.is_empty() {
            Completion::Text(choice.message.content.unwrap_or_default())
        } else {
            Completion::ToolCalls {
                content: choice.message.content.filter(|c| !c.is_empty()),
                calls,
            }
        };

        Ok(Generation {
            completion,
            usage: self.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tool;

    #[test]
    fn test_tools_omitted_when_empty() {
        let client = OpenAIClient::new("sk-test", "gpt-4o-mini").unwrap();
        let body = client.build_chat_request(&GenerateRequest::new(vec![Message::human("hi")]));
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_tool_result_message_shape() {
        let client = OpenAIClient::new("sk-test", "gpt-4o-mini").unwrap();
        let request = GenerateRequest::new(vec![
            Message::ai_with_tools(
                None,
                vec![ToolCall::new("call_1", "calculator", &json!({"expression": "1+1"}))],
            ),
            Message::tool_result("call_1", r#"{"result":2}"#),
        ])
        .with_tools(vec![Tool::new("calculator", "math", json!({"type": "object"}))]);
        let body = client.build_chat_request(&request);

        assert_eq!(body["messages"][0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(body["messages"][1]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "calculator");
    }
}
