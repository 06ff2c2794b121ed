use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chronochat_graph::TurnError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error("missing bearer token")]
    MissingToken,

    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Turn(e) => e.kind(),
            ApiError::MissingToken => "auth_error",
            ApiError::BadRequest(_) => "bad_request",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Turn(e) => match e {
                TurnError::Auth(_) => StatusCode::UNAUTHORIZED,
                TurnError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                TurnError::ThreadBusy { .. } => StatusCode::CONFLICT,
                TurnError::ThreadNotFound(_) => StatusCode::NOT_FOUND,
                TurnError::Forbidden(_) => StatusCode::FORBIDDEN,
                TurnError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                TurnError::ProviderRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TurnError::PersistedPartially { .. } | TurnError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                // client went away; nobody reads this
                TurnError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            },
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Turn(e) => e.retry_after(),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "Request failed");
        }

        // whole seconds, rounded up so clients never retry early
        let retry_after_secs = self
            .retry_after()
            .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0));

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
                retry_after_secs,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronochat_auth::AuthError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(TurnError::Auth(AuthError::Expired)), StatusCode::UNAUTHORIZED),
            (
                ApiError::from(TurnError::ThreadBusy {
                    thread_id: "t".into(),
                    retry_after: Duration::from_secs(2),
                }),
                StatusCode::CONFLICT,
            ),
            (ApiError::from(TurnError::Forbidden("t".into())), StatusCode::FORBIDDEN),
            (ApiError::from(TurnError::ProviderRejected("no".into())), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::MissingToken, StatusCode::UNAUTHORIZED),
            (ApiError::BadRequest("empty".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{}", error.kind());
        }
    }

    #[test]
    fn test_retry_after_header_rounds_up() {
        let response = ApiError::from(TurnError::RateLimited {
            retry_after: Duration::from_millis(1500),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_non_transient_errors_have_no_retry_header() {
        let response = ApiError::from(TurnError::ThreadNotFound("t".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
