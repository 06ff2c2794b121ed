use crate::error::TurnError;
use crate::orchestrator::Orchestrator;
use chrono::Utc;
use chronochat_auth::{RateDecision, RateLimiter, TokenVerifier};
use chronochat_persist::{AnalyticsEvent, AnalyticsWriter};
use chronochat_types::{Claims, RequestLog, SessionRecord, TurnInput, TurnOutcome};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const CHAT_OPERATION: &str = "chat.message";

/// Request boundary for a turn: verify the token, apply the rate limit, then
/// hand the turn to the orchestrator
///
/// Rejected tokens never touch the rate limiter or any store.
pub struct ChatService {
    verifier: Arc<TokenVerifier>,
    limiter: Arc<RateLimiter>,
    orchestrator: Orchestrator,
    analytics: Arc<AnalyticsWriter>,
}

impl ChatService {
    pub fn new(
        verifier: Arc<TokenVerifier>,
        limiter: Arc<RateLimiter>,
        orchestrator: Orchestrator,
        analytics: Arc<AnalyticsWriter>,
    ) -> Self {
        Self {
            verifier,
            limiter,
            orchestrator,
            analytics,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn process_turn(
        &self,
        token: &str,
        input: TurnInput,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();

        let claims = match self.verifier.verify(token).await {
            Ok(claims) => claims,
            Err(e) => {
                warn!(reason = e.reason(), "Token rejected");
                return Err(e.into());
            }
        };

        let result = self.authorized_turn(&claims, input, cancel).await;
        self.record_request(&claims.subject, &result, started);
        result
    }

    async fn authorized_turn(
        &self,
        claims: &Claims,
        input: TurnInput,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        if let RateDecision::Limited { retry_after } = self
            .limiter
            .check_scoped(&claims.subject, CHAT_OPERATION)
            .await
        {
            debug!(subject = %claims.subject, retry_after_ms = retry_after.as_millis() as u64, "Rate limited");
            return Err(TurnError::RateLimited { retry_after });
        }

        if let Some(session_id) = &claims.session_id {
            self.analytics.enqueue(AnalyticsEvent::Session(SessionRecord {
                subject_id: claims.subject.clone(),
                session_id: session_id.clone(),
                seen_at: Utc::now(),
            }));
        }

        self.orchestrator
            .process_turn(&claims.subject, input, cancel)
            .await
    }

    fn record_request(&self, subject: &str, result: &Result<TurnOutcome, TurnError>, started: Instant) {
        let (status, error) = match result {
            Ok(_) => ("ok".to_string(), None),
            Err(e) => (e.kind().to_string(), Some(e.to_string())),
        };
        self.analytics.enqueue(AnalyticsEvent::Request(RequestLog {
            subject_id: Some(subject.to_string()),
            operation: CHAT_OPERATION.to_string(),
            status,
            latency_ms: started.elapsed().as_millis() as u64,
            error,
            created_at: Utc::now(),
        }));
    }
}
