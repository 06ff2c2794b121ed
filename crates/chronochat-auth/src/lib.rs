pub mod error;
pub mod rate_limit;
pub mod signature;
pub mod verifier;

pub use error::AuthError;
pub use rate_limit::{Partitioning, RateDecision, RateLimitConfig, RateLimiter};
pub use signature::{JwtSignatureVerifier, SignatureVerifier};
pub use verifier::{token_digest, TokenVerifier, TokenVerifierConfig};
