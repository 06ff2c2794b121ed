use crate::capability::ToolCapability;
use crate::error::ToolError;
use async_trait::async_trait;
use chronochat_types::TurnMode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Document retrieval service used in retrieval mode
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn lookup(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>, ToolError>;
}

/// Backend reached over HTTP: `POST {endpoint}` with `{query, top_k}`
pub struct HttpRetrievalBackend {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpRetrievalBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    passages: Vec<RetrievedPassage>,
}

#[async_trait]
impl RetrievalBackend for HttpRetrievalBackend {
    async fn lookup(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>, ToolError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("retrieval request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "retrieval backend returned {}",
                response.status()
            )));
        }
        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("invalid retrieval response: {}", e)))?;
        Ok(body.passages)
    }
}

const RETRIEVAL_ONLY: &[TurnMode] = &[TurnMode::Retrieval];

pub struct RetrievalLookupTool {
    backend: Arc<dyn RetrievalBackend>,
    timeout: Duration,
    schema: Value,
}

impl RetrievalLookupTool {
    pub fn new(backend: Arc<dyn RetrievalBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "minLength": 1},
                    "top_k": {"type": "integer", "minimum": 1, "maximum": 20}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolCapability for RetrievalLookupTool {
    fn name(&self) -> &str {
        "retrieval_lookup"
    }

    fn description(&self) -> &str {
        "Look up passages from the user's indexed documents relevant to a query"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn modes(&self) -> &[TurnMode] {
        RETRIEVAL_ONLY
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("`query` must be a string".into()))?;
        let top_k = input.get("top_k").and_then(Value::as_u64).unwrap_or(4) as usize;

        let passages = self.backend.lookup(query, top_k).await?;
        Ok(json!({ "query": query, "passages": passages }))
    }
}
