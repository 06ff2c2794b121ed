use async_trait::async_trait;
use chronochat_tools::builtin::{
    CalculatorTool, CurrentTimeTool, RetrievalBackend, RetrievalLookupTool, RetrievedPassage,
    WebSearchConfig, WebSearchTool,
};
use chronochat_tools::{RegistrationError, ToolCapability, ToolError, ToolRegistry};
use chronochat_types::TurnMode;
use mockito::Matcher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct SlowTool {
    schema: Value,
}

#[async_trait]
impl ToolCapability for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "sleeps"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!({}))
    }
}

struct FixedBackend;

#[async_trait]
impl RetrievalBackend for FixedBackend {
    async fn lookup(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>, ToolError> {
        Ok((0..top_k)
            .map(|i| RetrievedPassage {
                source: format!("doc{}", i),
                content: format!("{} passage {}", query, i),
                score: 1.0 - i as f64 / 10.0,
            })
            .collect())
    }
}

fn registry() -> ToolRegistry {
    ToolRegistry::builder()
        .register(Arc::new(CalculatorTool::new()))
        .unwrap()
        .register(Arc::new(CurrentTimeTool::new()))
        .unwrap()
        .register(Arc::new(RetrievalLookupTool::new(
            Arc::new(FixedBackend),
            Duration::from_secs(2),
        )))
        .unwrap()
        .build()
}

#[test]
fn test_duplicate_names_rejected() {
    let result = ToolRegistry::builder()
        .register(Arc::new(CalculatorTool::new()))
        .unwrap()
        .register(Arc::new(CalculatorTool::new()));
    assert!(matches!(result, Err(RegistrationError::DuplicateName(name)) if name == "calculator"));
}

#[test]
fn test_descriptors_follow_mode() {
    let registry = registry();
    let normal: Vec<String> = registry
        .descriptors(TurnMode::Normal)
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    assert_eq!(normal, vec!["calculator", "current_time"]);

    let retrieval: Vec<String> = registry
        .descriptors(TurnMode::Retrieval)
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    assert_eq!(retrieval, vec!["calculator", "current_time", "retrieval_lookup"]);
}

#[tokio::test]
async fn test_invoke_calculator() {
    let output = registry()
        .invoke("calculator", TurnMode::Normal, json!({"expression": "6 * 7"}))
        .await
        .unwrap();
    assert_eq!(output["result"], 42.0);
}

#[tokio::test]
async fn test_unknown_tool() {
    let err = registry().invoke("shell", TurnMode::Normal, json!({})).await.unwrap_err();
    assert_eq!(err, ToolError::NotFound("shell".to_string()));
}

#[tokio::test]
async fn test_schema_violation_is_invalid_input() {
    let registry = registry();
    let err = registry
        .invoke("calculator", TurnMode::Normal, json!({"expr": "1+1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput(_)));

    let err = registry
        .invoke("calculator", TurnMode::Normal, json!({"expression": 12}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput(_)));
}

#[tokio::test]
async fn test_execution_error_is_structured() {
    let err = registry()
        .invoke("calculator", TurnMode::Normal, json!({"expression": "1/0"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "execution_failed");
    assert_eq!(err.to_output()["error"]["kind"], "execution_failed");
}

#[tokio::test]
async fn test_hard_timeout() {
    let registry = ToolRegistry::builder()
        .register(Arc::new(SlowTool {
            schema: json!({"type": "object"}),
        }))
        .unwrap()
        .build();

    let err = registry.invoke("slow", TurnMode::Normal, json!({})).await.unwrap_err();
    assert_eq!(err, ToolError::Timeout(Duration::from_millis(50)));
}

#[tokio::test]
async fn test_retrieval_lookup() {
    let output = registry()
        .invoke("retrieval_lookup", TurnMode::Retrieval, json!({"query": "billing", "top_k": 2}))
        .await
        .unwrap();
    let passages = output["passages"].as_array().unwrap();
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0]["source"], "doc0");
}

#[tokio::test]
async fn test_web_search_against_backend() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "rust async".into()),
            Matcher::UrlEncoded("count".into(), "2".into()),
        ]))
        .match_header("authorization", "Bearer search-key")
        .with_status(200)
        .with_body(
            json!({
                "results": [
                    {"title": "Tokio", "url": "https://tokio.rs", "snippet": "runtime"},
                    {"title": "Async book", "url": "https://rust-lang.github.io/async-book", "snippet": "guide"},
                    {"title": "Extra", "url": "https://example.com"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let tool = WebSearchTool::new(WebSearchConfig {
        endpoint: format!("{}/search", server.url()),
        api_key: Some("search-key".into()),
        timeout_secs: 5,
    })
    .unwrap();
    let registry = ToolRegistry::builder()
        .register(Arc::new(tool))
        .unwrap()
        .build();

    let output = registry
        .invoke("web_search", TurnMode::Normal, json!({"query": "rust async", "max_results": 2}))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(output["results"].as_array().unwrap().len(), 2);
    assert_eq!(output["results"][0]["title"], "Tokio");
}

#[tokio::test]
async fn test_web_search_backend_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let tool = WebSearchTool::new(WebSearchConfig {
        endpoint: format!("{}/search", server.url()),
        api_key: None,
        timeout_secs: 5,
    })
    .unwrap();

    let err = tool.execute(json!({"query": "x"})).await.unwrap_err();
    assert!(matches!(err, ToolError::ExecutionFailed(_)));
}

#[tokio::test]
async fn test_tool_outside_its_mode_is_not_found() {
    let err = registry()
        .invoke("retrieval_lookup", TurnMode::Normal, json!({"query": "billing"}))
        .await
        .unwrap_err();
    assert_eq!(err, ToolError::NotFound("retrieval_lookup".to_string()));
}
