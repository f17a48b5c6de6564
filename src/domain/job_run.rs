//! Job-run bookkeeping types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::EngineError;

/// Batch jobs the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Aggregate one day of raw events into daily metrics.
    TelemetryRollup,
    /// Score one day of metrics into trending snapshots.
    TrendingRefresh,
    /// Resolve a sample recommendation list per scope as a read-path check.
    SeedSample,
}

impl JobType {
    /// Every supported job.
    pub const ALL: [Self; 3] = [Self::TelemetryRollup, Self::TrendingRefresh, Self::SeedSample];

    /// Returns the job name used on the CLI, HTTP API and in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TelemetryRollup => "telemetry_rollup",
            Self::TrendingRefresh => "trending_refresh",
            Self::SeedSample => "seed_sample",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|j| j.as_str() == normalized)
            .ok_or_else(|| EngineError::UnsupportedJob(s.to_string()))
    }
}

/// Run state. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet finalized.
    Running,
    /// Finished normally.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Returns the stored status string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl FromStr for JobStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::Internal(format!("unknown job status: {other}"))),
        }
    }
}

/// One invocation of a batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    /// Run id.
    pub id: Uuid,
    /// Which job ran.
    pub job_type: JobType,
    /// Current state.
    pub status: JobStatus,
    /// Metadata merged across the run's phases.
    pub metadata: Document,
    /// Failure message for `Failed` runs.
    pub error_message: Option<String>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Finalization time; `None` while running.
    pub completed_at: Option<DateTime<Utc>>,
}
