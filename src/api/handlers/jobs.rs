//! Job trigger and job-run listing.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{JobRunDto, JobRunListResponse, JobRunsQuery, TriggerJobRequest, parse_limit};
use crate::app_state::AppState;
use crate::domain::{JobStatus, JobType};
use crate::error::{EngineError, ErrorResponse};

const DEFAULT_RUNS: usize = 20;
const MAX_RUNS: usize = 100;

/// `POST /jobs/{job}/runs` — Run a job now and wait for it to finish.
///
/// # Errors
///
/// Returns a 400 [`EngineError`] for an unknown job or bad date, before
/// any run is recorded. A job that fails while running returns 500 with
/// the failed run as the body.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{job}/runs",
    tag = "Jobs",
    summary = "Trigger a job",
    description = "Runs `telemetry_rollup`, `trending_refresh` or `seed_sample` for the target date (default: yesterday UTC) and returns the finalized run.",
    params(
        ("job" = String, Path, description = "Job name"),
    ),
    request_body(content = TriggerJobRequest, description = "Optional target date"),
    responses(
        (status = 200, description = "Run succeeded", body = JobRunDto),
        (status = 400, description = "Unknown job or invalid date", body = ErrorResponse),
        (status = 500, description = "Run failed", body = JobRunDto),
    )
)]
pub async fn trigger_job(
    State(state): State<AppState>,
    Path(job): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, EngineError> {
    let request: TriggerJobRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerJobRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| EngineError::InvalidRequest(format!("invalid JSON body: {e}")))?
    };

    let run = state.jobs.run(&job, request.target_date.as_deref()).await?;
    let status = match run.status {
        JobStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    Ok((status, Json(JobRunDto::from(run))))
}

/// `GET /jobs/runs` — Recent job runs, most recent first.
///
/// # Errors
///
/// Returns a 400 [`EngineError`] for an unknown job filter or bad limit.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/runs",
    tag = "Jobs",
    summary = "List job runs",
    description = "Returns recent runs with their metadata and last error, optionally filtered by job.",
    params(JobRunsQuery),
    responses(
        (status = 200, description = "Recent runs", body = JobRunListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
    )
)]
pub async fn list_job_runs(
    State(state): State<AppState>,
    Query(query): Query<JobRunsQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let job_type = query
        .job_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<JobType>)
        .transpose()?;
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_RUNS, MAX_RUNS)?;

    let runs = state.stores.jobs.recent_runs(job_type, limit).await?;
    let data: Vec<JobRunDto> = runs.into_iter().map(JobRunDto::from).collect();
    Ok(Json(JobRunListResponse {
        count: data.len(),
        data,
    }))
}

/// Job routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/runs", get(list_job_runs))
        .route("/jobs/{job}/runs", post(trigger_job))
}
