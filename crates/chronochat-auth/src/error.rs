use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed: {0}")]
    MalformedToken(String),

    #[error("token is missing required claim `{0}`")]
    MissingClaim(String),

    #[error("token issuer or audience is not accepted")]
    InvalidIssuer,

    #[error("token has been revoked")]
    Revoked,

    #[error("verification key could not be loaded: {0}")]
    KeyConfiguration(String),
}

impl AuthError {
    /// Retrying the same token never helps
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// The caller should obtain a fresh token from the identity provider
    pub fn requires_refresh(&self) -> bool {
        matches!(self, AuthError::Expired)
    }

    /// Stable machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::MissingClaim(_) => "missing_claim",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::Revoked => "revoked",
            AuthError::KeyConfiguration(_) => "key_configuration",
        }
    }
}
