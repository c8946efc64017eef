//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (subscribed to the broker)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;
use crate::upstream::LinkState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Returns 200 once the upstream subscription is active.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.upstream_state() {
        LinkState::Subscribed => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let upstream = state.upstream_state();

    // Viewers stay connected through a broker outage, they just stop
    // receiving readings
    let status = match upstream {
        LinkState::Subscribed => "healthy",
        _ => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        upstream,
        topic: state.topic.to_string(),
        connections: state.ws_connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
