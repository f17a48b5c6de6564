//! Liveness endpoint, mounted outside `/api/v1`.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Liveness payload. `status` is `degraded` when the job-run table cannot be
/// read; the process itself is still serving.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
    store: String,
    last_job_run_at: Option<DateTime<Utc>>,
    checked_at: DateTime<Utc>,
}

/// `GET /health` — Liveness plus a cheap store check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reports version, store backend and the start time of the most recent job run. Status is `degraded` when the store cannot be read.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, last_job_run_at) = match state.stores.jobs.recent_runs(None, 1).await {
        Ok(runs) => ("healthy", runs.first().map(|r| r.started_at)),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not read job runs");
            ("degraded", None)
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store_backend.as_str().to_string(),
        last_job_run_at,
        checked_at: Utc::now(),
    })
}

/// Root-level routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
