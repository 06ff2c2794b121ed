#![allow(dead_code)]

use async_trait::async_trait;
use chronochat_cache::MemoryCache;
use chronochat_graph::{Orchestrator, OrchestratorConfig, RetryPolicy, TokenCounter};
use chronochat_llm::{
    Completion, CompletionProvider, GenerateRequest, Generation, ProviderError, TokenUsage, ToolCall,
};
use chronochat_persist::{
    AnalyticsWriter, AnalyticsWriterConfig, MemoryAnalyticsStore, MemoryConversationStore,
};
use chronochat_tools::builtin::CalculatorTool;
use chronochat_tools::{ToolCapability, ToolError, ToolRegistry};
use chronochat_types::TurnMode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const MODEL: &str = "scripted-1";

pub fn text(content: &str) -> Result<Generation, ProviderError> {
    Ok(Generation {
        completion: Completion::Text(content.to_string()),
        usage: Some(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        }),
        model: MODEL.to_string(),
    })
}

pub fn tool_calls(calls: Vec<ToolCall>) -> Result<Generation, ProviderError> {
    Ok(Generation {
        completion: Completion::ToolCalls {
            content: None,
            calls,
        },
        usage: None,
        model: MODEL.to_string(),
    })
}

/// Replays queued responses and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<Generation, ProviderError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<Generation, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    pub fn push(&self, response: Result<Generation, ProviderError>) {
        self.responses.lock().push_back(response);
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        MODEL
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        self.requests.lock().push(request);
        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| text("done"))
    }
}

/// Requests a calculator call on every generation
#[derive(Default)]
pub struct AlwaysToolProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always-tool"
    }

    fn model(&self) -> &str {
        MODEL
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<Generation, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tool_calls(vec![ToolCall::new(
            format!("call_{}", n),
            "calculator",
            &json!({ "expression": "1 + 1" }),
        )])
    }
}

/// Blocks inside `generate` until released
#[derive(Default)]
pub struct GatedProvider {
    pub entered: Notify,
    pub release: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    fn model(&self) -> &str {
        MODEL
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<Generation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        text("finally")
    }
}

/// Always fails with a retryable 503
#[derive(Default)]
pub struct OverloadedProvider {
    pub entered: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for OverloadedProvider {
    fn name(&self) -> &str {
        "overloaded"
    }

    fn model(&self) -> &str {
        MODEL
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<Generation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        Err(ProviderError::Server {
            status: 503,
            message: "overloaded".into(),
        })
    }
}

/// Canned web search results
pub struct StubSearchTool {
    schema: Value,
}

impl StubSearchTool {
    pub fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        }
    }
}

#[async_trait]
impl ToolCapability for StubSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        Ok(json!({
            "query": input["query"],
            "results": [{
                "title": "Rust Programming Language",
                "url": "https://www.rust-lang.org",
                "snippet": "A language empowering everyone"
            }]
        }))
    }
}

/// Knowledge base lookup offered only in retrieval mode
pub struct StubLookupTool {
    schema: Value,
}

impl StubLookupTool {
    pub fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        }
    }
}

#[async_trait]
impl ToolCapability for StubLookupTool {
    fn name(&self) -> &str {
        "retrieval_lookup"
    }

    fn description(&self) -> &str {
        "Look up internal documents"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn modes(&self) -> &[TurnMode] {
        &[TurnMode::Retrieval]
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        Ok(json!({ "query": input["query"], "passages": ["internal handbook"] }))
    }
}

pub fn registry() -> Arc<ToolRegistry> {
    Arc::new(
        ToolRegistry::builder()
            .register(Arc::new(CalculatorTool::new()))
            .unwrap()
            .register(Arc::new(StubSearchTool::new()))
            .unwrap()
            .register(Arc::new(StubLookupTool::new()))
            .unwrap()
            .build(),
    )
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryConversationStore>,
    pub cache: Arc<MemoryCache>,
    pub analytics: Arc<MemoryAnalyticsStore>,
    pub writer: Arc<AnalyticsWriter>,
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig::default().with_retry(RetryPolicy::none())
}

pub fn harness(provider: Arc<dyn CompletionProvider>, config: OrchestratorConfig) -> Harness {
    let store = Arc::new(MemoryConversationStore::new());
    let cache = Arc::new(MemoryCache::new());
    let analytics = Arc::new(MemoryAnalyticsStore::new());
    let writer = Arc::new(AnalyticsWriter::start(
        analytics.clone(),
        AnalyticsWriterConfig::default(),
    ));

    let orchestrator = Orchestrator::builder()
        .provider(provider)
        .tools(registry())
        .store(store.clone())
        .cache(cache.clone())
        .analytics(writer.clone())
        .token_counter(TokenCounter::approximate())
        .config(config)
        .build()
        .unwrap();

    Harness {
        orchestrator,
        store,
        cache,
        analytics,
        writer,
    }
}
