use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub conversation_store: bool,
    pub analytics_store: bool,
    pub session_cache: bool,
}

impl HealthChecks {
    fn all_ok(&self) -> bool {
        self.conversation_store && self.analytics_store && self.session_cache
    }
}

async fn probe<E, F>(name: &'static str, check: F) -> bool
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(dependency = name, error = %e, "Health probe failed");
            false
        }
        Err(_) => {
            warn!(dependency = name, "Health probe timed out");
            false
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (conversation_store, analytics_store, session_cache) = tokio::join!(
        probe("conversation_store", state.store.ping()),
        probe("analytics_store", state.analytics.ping()),
        probe("session_cache", state.cache.ping()),
    );
    let checks = HealthChecks {
        conversation_store,
        analytics_store,
        session_cache,
    };

    let healthy = checks.all_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" },
            timestamp: Utc::now().to_rfc3339(),
            service: "chronochat-api",
            checks,
        }),
    )
}
