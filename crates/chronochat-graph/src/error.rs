use chronochat_auth::AuthError;
use chronochat_llm::ProviderError;
use chronochat_persist::PersistError;
use chronochat_types::TurnOutcome;
use std::time::Duration;
use thiserror::Error;

const UPSTREAM_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Everything a turn can fail with, as seen by the caller
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("thread {thread_id} is already processing a turn")]
    ThreadBusy { thread_id: String, retry_after: Duration },

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("thread {0} belongs to another user")]
    Forbidden(String),

    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("provider rejected the request: {0}")]
    ProviderRejected(String),

    /// The answer was generated but could not be stored
    #[error("turn was not fully persisted: {message}")]
    PersistedPartially {
        outcome: Box<TurnOutcome>,
        message: String,
    },

    #[error("turn cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl TurnError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Auth(_) => "auth_error",
            TurnError::RateLimited { .. } => "rate_limited",
            TurnError::ThreadBusy { .. } => "thread_busy",
            TurnError::ThreadNotFound(_) => "thread_not_found",
            TurnError::Forbidden(_) => "forbidden",
            TurnError::UpstreamUnavailable { .. } => "upstream_unavailable",
            TurnError::ProviderRejected(_) => "provider_rejected",
            TurnError::PersistedPartially { .. } => "persisted_partially",
            TurnError::Cancelled => "cancelled",
            TurnError::Internal(_) => "internal",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TurnError::RateLimited { retry_after } | TurnError::ThreadBusy { retry_after, .. } => {
                Some(*retry_after)
            }
            TurnError::UpstreamUnavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn store_timeout(operation: &str) -> Self {
        TurnError::UpstreamUnavailable {
            message: format!("conversation store timed out during {}", operation),
            retry_after: Some(UPSTREAM_RETRY_AFTER),
        }
    }
}

impl From<ProviderError> for TurnError {
    fn from(err: ProviderError) -> Self {
        if err.is_rejection() {
            TurnError::ProviderRejected(err.to_string())
        } else {
            TurnError::UpstreamUnavailable {
                message: err.to_string(),
                retry_after: Some(UPSTREAM_RETRY_AFTER),
            }
        }
    }
}

impl From<PersistError> for TurnError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::ThreadNotFound(id) => TurnError::ThreadNotFound(id),
            e if e.is_transient() => TurnError::UpstreamUnavailable {
                message: e.to_string(),
                retry_after: Some(UPSTREAM_RETRY_AFTER),
            },
            e => TurnError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_split_by_kind() {
        let rejected: TurnError = ProviderError::ContentPolicy("blocked".into()).into();
        assert_eq!(rejected.kind(), "provider_rejected");
        assert_eq!(rejected.retry_after(), None);

        let unavailable: TurnError = ProviderError::Timeout.into();
        assert_eq!(unavailable.kind(), "upstream_unavailable");
        assert_eq!(unavailable.retry_after(), Some(UPSTREAM_RETRY_AFTER));
    }

    #[test]
    fn test_persist_errors_map_to_kinds() {
        let missing: TurnError = PersistError::ThreadNotFound("t1".into()).into();
        assert_eq!(missing.kind(), "thread_not_found");

        let flaky: TurnError = PersistError::Connection("reset".into()).into();
        assert_eq!(flaky.kind(), "upstream_unavailable");

        let broken: TurnError = PersistError::Internal("bug".into()).into();
        assert_eq!(broken.kind(), "internal");
    }
}
