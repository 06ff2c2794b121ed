use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Verified identity attributes extracted from a signed credential.
///
/// Claims are immutable once verified. The verifier caches them keyed by the
/// hash of the raw token and always re-checks `expires_at` before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub raw: Map<String, Value>,
}

impl Claims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left before expiry, zero when already expired
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(expires_in: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            subject: "user_1".to_string(),
            expires_at: now + expires_in,
            issued_at: now,
            issuer: None,
            session_id: None,
            raw: Map::new(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let c = claims(Duration::seconds(10));
        assert!(!c.is_expired_at(c.expires_at - Duration::seconds(1)));
        assert!(c.is_expired_at(c.expires_at));
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let c = claims(Duration::seconds(-5));
        assert_eq!(c.remaining(Utc::now()), std::time::Duration::ZERO);
    }
}
