use crate::error::AuthError;
use crate::signature::SignatureVerifier;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use chronochat_cache::{CacheError, SessionCache};
use chronochat_types::Claims;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TokenVerifierConfig {
    /// Expected `iss`; any issuer is accepted when unset
    pub issuer: Option<String>,
    /// Expected `aud`; not checked when unset
    pub audience: Option<String>,
    /// Claims required beyond `sub`, `exp` and `iat`
    pub required_claims: Vec<String>,
    /// Clock skew tolerated on `iat`; `exp` is always checked exactly
    pub leeway: Duration,
    /// Upper bound on how long verified claims stay cached
    pub max_cache_ttl: Duration,
    pub cache_prefix: String,
}

impl Default for TokenVerifierConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            required_claims: Vec::new(),
            leeway: Duration::ZERO,
            max_cache_ttl: Duration::from_secs(300),
            cache_prefix: "auth".to_string(),
        }
    }
}

impl TokenVerifierConfig {
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn with_max_cache_ttl(mut self, ttl: Duration) -> Self {
        self.max_cache_ttl = ttl;
        self
    }
}

const BASE_REQUIRED_CLAIMS: [&str; 3] = ["sub", "exp", "iat"];

/// Validates bearer tokens and caches the verified claims
pub struct TokenVerifier {
    signature: Arc<dyn SignatureVerifier>,
    cache: Arc<dyn SessionCache>,
    config: TokenVerifierConfig,
}

impl TokenVerifier {
    pub fn new(
        signature: Arc<dyn SignatureVerifier>,
        cache: Arc<dyn SessionCache>,
        config: TokenVerifierConfig,
    ) -> Self {
        Self {
            signature,
            cache,
            config,
        }
    }

    pub async fn verify(&self, raw_token: &str) -> Result<Claims, AuthError> {
        self.verify_at(raw_token, Utc::now()).await
    }

    /// Verify against an explicit wall-clock instant
    pub async fn verify_at(&self, raw_token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() || raw_token.split('.').count() != 3 {
            return Err(AuthError::MalformedToken("expected three dot-separated segments".into()));
        }

        let digest = token_digest(raw_token);

        match self.cache.get(&self.revoked_key(&digest)).await {
            Ok(Some(_)) => return Err(AuthError::Revoked),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Revocation lookup failed, continuing with signature check"),
        }

        let claims_key = self.claims_key(&digest);
        if let Some(claims) = self.cached_claims(&claims_key).await {
            if self.is_expired(&claims, now) {
                if let Err(e) = self.cache.delete(&claims_key).await {
                    warn!(error = %e, "Failed to evict expired claims");
                }
                return Err(AuthError::Expired);
            }
            debug!(subject = %claims.subject, "Claims served from cache");
            return Ok(claims);
        }

        let raw = self.signature.verify_signature(raw_token)?;
        let claims = self.validate_claims(raw, now)?;

        let ttl = claims.remaining(now).min(self.config.max_cache_ttl);
        if !ttl.is_zero() {
            match serde_json::to_string(&claims) {
                Ok(encoded) => {
                    if let Err(e) = self.cache.set_with_ttl(&claims_key, &encoded, ttl).await {
                        warn!(error = %e, "Failed to cache verified claims");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode verified claims"),
            }
        }

        debug!(subject = %claims.subject, "Token verified");
        Ok(claims)
    }

    /// Reject `raw_token` until `until`, regardless of its signature
    pub async fn revoke(&self, raw_token: &str, until: DateTime<Utc>) -> Result<(), CacheError> {
        let digest = token_digest(raw_token.trim());
        self.cache.delete(&self.claims_key(&digest)).await?;

        let ttl = (until - Utc::now())
            .to_std()
            .unwrap_or_default()
            .max(Duration::from_secs(1));
        self.cache
            .set_with_ttl(&self.revoked_key(&digest), "1", ttl)
            .await
    }

    async fn cached_claims(&self, key: &str) -> Option<Claims> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Claims cache lookup failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "Discarding undecodable cached claims");
                let _ = self.cache.delete(key).await;
                None
            }
        }
    }

    fn is_expired(&self, claims: &Claims, now: DateTime<Utc>) -> bool {
        claims.is_expired_at(now)
    }

    fn validate_claims(&self, raw: Map<String, Value>, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        for name in BASE_REQUIRED_CLAIMS
            .iter()
            .copied()
            .chain(self.config.required_claims.iter().map(String::as_str))
        {
            if raw.get(name).map_or(true, Value::is_null) {
                return Err(AuthError::MissingClaim(name.to_string()));
            }
        }

        let subject = raw
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::MalformedToken("`sub` must be a non-empty string".into()))?
            .to_string();
        let expires_at = timestamp_claim(&raw, "exp")?;
        let issued_at = timestamp_claim(&raw, "iat")?;
        let issuer = raw.get("iss").and_then(Value::as_str).map(str::to_string);

        let claims = Claims {
            subject,
            expires_at,
            issued_at,
            issuer,
            session_id: raw.get("sid").and_then(Value::as_str).map(str::to_string),
            raw,
        };

        if self.is_expired(&claims, now) {
            return Err(AuthError::Expired);
        }

        if claims.issued_at > now + leeway(self.config.leeway) {
            return Err(AuthError::MalformedToken("`iat` is in the future".into()));
        }

        if let Some(expected) = &self.config.issuer {
            if claims.issuer.as_deref() != Some(expected.as_str()) {
                return Err(AuthError::InvalidIssuer);
            }
        }

        if let Some(expected) = &self.config.audience {
            let accepted = match claims.claim("aud") {
                Some(Value::String(aud)) => aud == expected,
                Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(expected.as_str())),
                _ => false,
            };
            if !accepted {
                return Err(AuthError::InvalidIssuer);
            }
        }

        Ok(claims)
    }

    fn claims_key(&self, digest: &str) -> String {
        format!("{}:claims:{}", self.config.cache_prefix, digest)
    }

    fn revoked_key(&self, digest: &str) -> String {
        format!("{}:revoked:{}", self.config.cache_prefix, digest)
    }
}

/// SHA-256 hex digest; raw tokens are never used as cache keys
pub fn token_digest(raw_token: &str) -> String {
    hex::encode(Sha256::digest(raw_token.as_bytes()))
}

fn leeway(leeway: Duration) -> ChronoDuration {
    ChronoDuration::from_std(leeway).unwrap_or_else(|_| ChronoDuration::zero())
}

fn timestamp_claim(raw: &Map<String, Value>, name: &str) -> Result<DateTime<Utc>, AuthError> {
    let seconds = raw
        .get(name)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or_else(|| AuthError::MalformedToken(format!("`{}` must be a numeric timestamp", name)))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| AuthError::MalformedToken(format!("`{}` is out of range", name)))
}
