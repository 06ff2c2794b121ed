// Google Gemini generateContent backend

use crate::error::ProviderError;
use crate::traits::{Completion, CompletionProvider, GenerateRequest, Generation, TokenUsage};
use crate::types::{Message, ToolCall};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client (HTTP direct, no SDK)
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Option<Duration>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key.into())
                .map_err(|_| ProviderError::InvalidRequest("invalid API key format".into()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: GEMINI_API_BASE.to_string(),
            model: model.into(),
            timeout: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_request(&self, request: &GenerateRequest) -> Value {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        // Gemini correlates function responses by name, not by call id
        let mut call_names: HashMap<&str, &str> = HashMap::new();
        let mut pending_responses: Vec<Value> = Vec::new();

        for message in &request.messages {
            if !matches!(message, Message::Tool { .. }) && !pending_responses.is_empty() {
                contents.push(json!({
                    "role": "user",
                    "parts": std::mem::take(&mut pending_responses),
                }));
            }

            match message {
                Message::System { content } => {
                    system_parts.push(json!({ "text": content.to_plain() }));
                }
                Message::Human { content } => contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": content.to_plain() }],
                })),
                Message::AI {
                    content,
                    tool_calls,
                } => {
                    let mut parts = Vec::new();
                    if let Some(content) = content {
                        parts.push(json!({ "text": content.to_plain() }));
                    }
                    for call in tool_calls.iter().flatten() {
                        call_names.insert(call.id.as_str(), call.name());
                        let args = call.arguments_value().unwrap_or_else(|_| json!({}));
                        parts.push(json!({
                            "functionCall": { "name": call.name(), "args": args }
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(json!({ "role": "model", "parts": parts }));
                    }
                }
                Message::Tool {
                    tool_call_id,
                    content,
                } => {
                    let name = call_names
                        .get(tool_call_id.as_str())
                        .copied()
                        .unwrap_or(tool_call_id.as_str());
                    pending_responses.push(json!({
                        "functionResponse": {
                            "name": name,
                            "response": response_object(&content.to_plain()),
                        }
                    }));
                }
            }
        }

        if !pending_responses.is_empty() {
            contents.push(json!({ "role": "user", "parts": pending_responses }));
        }

        let mut body = json!({ "contents": contents });
        if let Some(obj) = body.as_object_mut() {
            if !system_parts.is_empty() {
                obj.insert(
                    "systemInstruction".to_string(),
                    json!({ "parts": system_parts }),
                );
            }
            if !request.tools.is_empty() {
                let declarations: Vec<Value> = request
                    .tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "name": tool.function.name,
                            "description": tool.function.description,
                            "parameters": tool.function.parameters,
                        })
                    })
                    .collect();
                obj.insert(
                    "tools".to_string(),
                    json!([{ "functionDeclarations": declarations }]),
                );
            }

            let mut generation_config = Map::new();
            if let Some(temp) = request.options.temperature {
                generation_config.insert("temperature".to_string(), json!(temp));
            }
            if let Some(max_tokens) = request.options.max_tokens {
                generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
            }
            if !generation_config.is_empty() {
                obj.insert(
                    "generationConfig".to_string(),
                    Value::Object(generation_config),
                );
            }
        }

        body
    }
}

/// Function responses must be JSON objects
fn response_object(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "result": content }),
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_request(&request);

        tracing::debug!(model = %self.model, messages = request.messages.len(), tools = request.tools.len(), "gemini generate");

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

        let parsed: GeminiResponse = response.json().await.map_err(ProviderError::from_reqwest)?;
        parsed.into_generation(&self.model)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCallPart>,
}

#[derive(Debug, Deserialize)]
struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GeminiResponse {
    fn into_generation(self, requested_model: &str) -> Result<Generation, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::ContentPolicy(format!("prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("response has no candidates".into()))?;

        if matches!(
            candidate.finish_reason.as_deref(),
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST")
        ) {
            return Err(ProviderError::ContentPolicy(
                "candidate blocked by safety filter".into(),
            ));
        }

        let mut text = String::new();
        let mut calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                let args = if call.args.is_null() { json!({}) } else { call.args };
                calls.push(ToolCall::new(format!("call_{}", calls.len()), call.name, &args));
            }
        }

        let completion = if calls.is_empty() {
            Completion::Text(text)
        } else {
            Completion::ToolCalls {
                content: Some(text).filter(|t| !t.is_empty()),
                calls,
            }
        };

        Ok(Generation {
            completion,
            usage: self.usage_metadata.map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            model: self
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_moves_to_instruction() {
        let client = GeminiClient::new("key", "gemini-1.5-flash").unwrap();
        let body = client.build_request(&GenerateRequest::new(vec![
            Message::system("be nice"),
            Message::human("hello"),
        ]));
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be nice");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn test_tool_responses_grouped_and_named() {
        let client = GeminiClient::new("key", "gemini-1.5-flash").unwrap();
        let body = client.build_request(&GenerateRequest::new(vec![
            Message::human("what is 2+2 and the time?"),
            Message::ai_with_tools(
                None,
                vec![
                    ToolCall::new("call_0", "calculator", &json!({"expression": "2+2"})),
                    ToolCall::new("call_1", "current_time", &json!({})),
                ],
            ),
            Message::tool_result("call_0", r#"{"result":4}"#),
            Message::tool_result("call_1", "\"12:00\""),
        ]));

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["functionResponse"]["name"], "calculator");
        assert_eq!(responses[0]["functionResponse"]["response"]["result"], 4);
        assert_eq!(responses[1]["functionResponse"]["response"]["result"], "12:00");
    }
}
