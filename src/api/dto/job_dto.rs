//! DTOs for the job trigger and job-run listing endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{Document, JobRun};

/// Request body for `POST /api/v1/jobs/{job}/runs`. The body may be omitted.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TriggerJobRequest {
    /// `YYYY-MM-DD` or RFC 3339. Defaults to yesterday (UTC).
    #[serde(default)]
    pub target_date: Option<String>,
}

/// Query parameters for `GET /api/v1/jobs/runs`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobRunsQuery {
    /// Restrict to one job (`telemetry_rollup`, `trending_refresh`,
    /// `seed_sample`).
    pub job_type: Option<String>,
    /// Number of runs, 1 to 100. Defaults to 20.
    pub limit: Option<String>,
}

/// One job run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobRunDto {
    /// Run id.
    pub id: Uuid,
    /// Job name.
    pub job_type: String,
    /// `running`, `succeeded` or `failed`.
    pub status: String,
    /// Metadata merged across the run.
    #[schema(value_type = Object)]
    pub metadata: Document,
    /// Failure message.
    pub error_message: Option<String>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finalization time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobRun> for JobRunDto {
    fn from(run: JobRun) -> Self {
        Self {
            id: run.id,
            job_type: run.job_type.as_str().to_string(),
            status: run.status.as_str().to_string(),
            metadata: run.metadata,
            error_message: run.error_message,
            started_at: run.started_at,
            completed_at: run.completed_at,
        }
    }
}

/// Response body for `GET /api/v1/jobs/runs`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobRunListResponse {
    /// Runs, most recent first.
    pub data: Vec<JobRunDto>,
    /// Number of runs returned.
    pub count: usize,
}
