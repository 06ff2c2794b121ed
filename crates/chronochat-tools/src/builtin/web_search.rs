use crate::capability::ToolCapability;
use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Search endpoint accepting `GET ?q=<query>&count=<n>`
    pub endpoint: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Web search over an HTTP JSON backend
pub struct WebSearchTool {
    http_client: reqwest::Client,
    config: WebSearchConfig,
    schema: Value,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Result<Self, ToolError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
            schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "minLength": 1, "description": "Search query"},
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 10}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        })
    }
}

#[async_trait]
impl ToolCapability for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with title, url and snippet"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("`query` must be a string".into()))?;
        let max_results = input.get("max_results").and_then(Value::as_u64).unwrap_or(5) as usize;

        let count = max_results.to_string();
        let mut request = self
            .http_client
            .get(&self.config.endpoint)
            .query(&[("q", query), ("count", count.as_str())]);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("search request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "search backend returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("invalid search response: {}", e)))?;
        let results: Vec<SearchResult> = body.results.into_iter().take(max_results).collect();

        Ok(json!({ "query": query, "results": results }))
    }
}
