use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider request timed out")]
    Timeout,

    #[error("provider rate limited the request")]
    RateLimited,

    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout | ProviderError::RateLimited => {
                true
            }
            ProviderError::Server { status, .. } => *status >= 500,
            ProviderError::ContentPolicy(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::Decode(_) => false,
        }
    }

    /// Content-policy and invalid-request rejections
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ProviderError::ContentPolicy(_) | ProviderError::InvalidRequest(_)
        )
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    /// Map a non-success HTTP status and its body to an error kind
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => ProviderError::RateLimited,
            s if s >= 500 => ProviderError::Server {
                status: s,
                message: truncate(body),
            },
            400..=499 if mentions_policy(body) => ProviderError::ContentPolicy(truncate(body)),
            _ => ProviderError::InvalidRequest(format!("HTTP {}: {}", status, truncate(body))),
        }
    }
}

const POLICY_MARKERS: [&str; 3] = ["content_filter", "content_policy", "SAFETY"];

fn mentions_policy(body: &str) -> bool {
    POLICY_MARKERS.iter().any(|marker| body.contains(marker))
}

fn truncate(body: &str) -> String {
    body.chars().take(512).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!ProviderError::ContentPolicy("blocked".into()).is_transient());
        assert!(!ProviderError::InvalidRequest("bad".into()).is_transient());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ProviderError::from_status(429, ""),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            ProviderError::from_status(502, "bad gateway"),
            ProviderError::Server { status: 502, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(400, r#"{"error":{"code":"content_filter"}}"#),
            ProviderError::ContentPolicy(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, "unauthorized"),
            ProviderError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(ProviderError::ContentPolicy("blocked".into()).is_rejection());
        assert!(!ProviderError::Timeout.is_rejection());
    }
}
