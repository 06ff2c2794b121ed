use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use chronochat_types::{ToolTrace, TurnInput, TurnMode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub mode: TurnMode,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub tool_calls: Vec<ToolTrace>,
    pub incomplete: bool,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Serialize)]
pub struct ChatMetadata {
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_sequence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sequence: Option<u64>,
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingToken)
}

/// POST /chat/message
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let token = bearer_token(&headers)?;
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let mut input = TurnInput::new(req.message).with_mode(req.mode);
    if let Some(id) = req.conversation_id.filter(|id| !id.trim().is_empty()) {
        input = input.in_thread(id);
    }

    // cancels the turn if the client disconnects and this future is dropped
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let outcome = state.chat.process_turn(token, input, cancel).await?;

    Ok(Json(ChatResponse {
        response: outcome.assistant_text,
        conversation_id: outcome.thread_id,
        tool_calls: outcome.tool_trace,
        incomplete: outcome.incomplete,
        metadata: ChatMetadata {
            total_tokens: outcome.total_tokens,
            first_sequence: outcome.sequence.map(|r| r.first),
            last_sequence: outcome.sequence.map(|r| r.last),
        },
    }))
}
