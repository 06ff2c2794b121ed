use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use chronochat_api::{build_router, AppState};
use chronochat_auth::{JwtSignatureVerifier, RateLimitConfig, RateLimiter, TokenVerifier, TokenVerifierConfig};
use chronochat_cache::MemoryCache;
use chronochat_graph::{ChatService, Orchestrator, TokenCounter};
use chronochat_llm::{
    Completion, CompletionProvider, GenerateRequest, Generation, Message, ProviderError,
};
use chronochat_persist::{AnalyticsWriter, AnalyticsWriterConfig, MemoryAnalyticsStore, MemoryConversationStore};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &[u8] = b"api-test-secret";

struct EchoProvider;

#[async_trait]
impl CompletionProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-1"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        let last = match request.messages.last() {
            Some(Message::Human { content }) => content.to_plain(),
            _ => String::new(),
        };
        Ok(Generation {
            completion: Completion::Text(format!("echo: {}", last)),
            usage: None,
            model: "echo-1".to_string(),
        })
    }
}

fn app(limit: u32) -> Router {
    let store = Arc::new(MemoryConversationStore::new());
    let cache = Arc::new(MemoryCache::new());
    let analytics = Arc::new(MemoryAnalyticsStore::new());
    let writer = Arc::new(AnalyticsWriter::start(analytics.clone(), AnalyticsWriterConfig::default()));

    let orchestrator = Orchestrator::builder()
        .provider(Arc::new(EchoProvider))
        .store(store.clone())
        .cache(cache.clone())
        .analytics(writer.clone())
        .token_counter(TokenCounter::approximate())
        .build()
        .unwrap();

    let verifier = TokenVerifier::new(
        Arc::new(JwtSignatureVerifier::hmac_secret(SECRET).unwrap()),
        cache.clone(),
        TokenVerifierConfig::default(),
    );
    let limiter = RateLimiter::new(
        cache.clone(),
        RateLimitConfig {
            limit,
            ..RateLimitConfig::default()
        },
    );
    let chat = ChatService::new(Arc::new(verifier), Arc::new(limiter), orchestrator, writer);

    let state = AppState::new(chat, store, analytics, cache);
    build_router(state, Duration::from_secs(10), &["*".to_string()])
}

fn token(expires_in_secs: i64) -> String {
    let now = Utc::now().timestamp();
    encode(
        &Header::default(),
        &json!({ "sub": "user-1", "iat": now - 5, "exp": now + expires_in_secs }),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn chat_request(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat/message")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_all_dependencies() {
    let response = app(10)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["session_cache"], true);
}

#[tokio::test]
async fn test_chat_message_round_trip() {
    let app = app(10);
    let bearer = token(3600);

    let response = app
        .clone()
        .oneshot(chat_request(Some(&bearer), json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    assert_eq!(first["response"], "echo: hello");
    assert_eq!(first["incomplete"], false);
    assert_eq!(first["metadata"]["first_sequence"], 1);
    assert_eq!(first["metadata"]["last_sequence"], 2);

    let conversation_id = first["conversation_id"].as_str().unwrap().to_string();
    let response = app
        .oneshot(chat_request(
            Some(&bearer),
            json!({ "message": "again", "conversation_id": conversation_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = json_body(response).await;
    assert_eq!(second["conversation_id"], conversation_id.as_str());
    assert_eq!(second["metadata"]["first_sequence"], 3);
}

#[tokio::test]
async fn test_missing_and_expired_tokens_are_unauthorized() {
    let app = app(10);

    let response = app
        .clone()
        .oneshot(chat_request(None, json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(chat_request(Some(&token(-60)), json!({ "message": "hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["kind"], "auth_error");
    assert!(body["error"].get("retry_after_secs").is_none());
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let response = app(10)
        .oneshot(chat_request(Some(&token(3600)), json!({ "message": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["kind"], "bad_request");
}

#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let response = app(10)
        .oneshot(chat_request(
            Some(&token(3600)),
            json!({ "message": "hello", "conversation_id": "missing" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["kind"], "thread_not_found");
}

#[tokio::test]
async fn test_rate_limited_request_carries_retry_after() {
    let app = app(1);
    let bearer = token(3600);

    let first = app
        .clone()
        .oneshot(chat_request(Some(&bearer), json!({ "message": "one" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(chat_request(Some(&bearer), json!({ "message": "two" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
    let body = json_body(second).await;
    assert_eq!(body["error"]["kind"], "rate_limited");
    assert!(body["error"]["retry_after_secs"].as_u64().unwrap() >= 1);
}
