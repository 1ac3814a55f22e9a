//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness response listing which providers are wired in
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub reply: CheckResult,
    pub tts: CheckResult,
    pub upload: CheckResult,
    pub stt: CheckResult,
}

/// Result of a single check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok(provider: &'static str) -> Self {
        Self {
            status: "ok",
            provider: Some(provider),
            message: None,
        }
    }

    fn unavailable() -> Self {
        Self {
            status: "unavailable",
            provider: None,
            message: Some("not configured".to_string()),
        }
    }

    fn from_provider(provider: Option<&'static str>) -> Self {
        provider.map_or_else(Self::unavailable, Self::ok)
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe
///
/// Missing synthesis or hosting only degrades replies to platform speech,
/// so the service always reports ready.
async fn ready(State(state): State<Arc<ApiState>>) -> Json<ReadinessResponse> {
    let pipeline = &state.pipeline;

    Json(ReadinessResponse {
        status: "ok",
        checks: ReadinessChecks {
            reply: CheckResult::ok(pipeline.reply_provider_name()),
            tts: CheckResult::from_provider(pipeline.synthesizer_name()),
            upload: CheckResult::from_provider(pipeline.host_name()),
            stt: CheckResult::from_provider(pipeline.transcriber_name()),
        },
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .with_state(state)
}
