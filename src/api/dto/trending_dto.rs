//! DTOs for `GET /api/v1/trending`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::snapshot::trending_reason;
use crate::domain::{Document, SeedEntity};
use crate::service::TrendingEntry;

/// Query parameters for the trending list.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendingQuery {
    /// `card` or `deck`. Required.
    pub scope: Option<String>,
    /// Trending period. Defaults to `daily`.
    pub period: Option<String>,
    /// Restrict to cards legal in, or decks built for, this format.
    pub format: Option<String>,
    /// Number of entries, 1 to 50. Defaults to 8.
    pub limit: Option<String>,
}

/// One row of the trending list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrendingEntryDto {
    /// 1-based position.
    pub rank: usize,
    /// Card or deck id.
    pub subject_id: Uuid,
    /// Composite score, 4 fraction digits.
    pub trend_score: f64,
    /// Named sub-scores.
    #[schema(value_type = Object)]
    pub components: Document,
    /// Human-readable summary of the components.
    pub reason: String,
    /// Display snapshot of the subject.
    #[schema(value_type = Object)]
    pub entity: SeedEntity,
    /// When the snapshot was scored.
    pub calculated_at: DateTime<Utc>,
}

impl TrendingEntryDto {
    /// Builds the DTO for the entry at 1-based `rank`.
    #[must_use]
    pub fn new(rank: usize, entry: TrendingEntry) -> Self {
        let reason = trending_reason(&entry.snapshot);
        Self {
            rank,
            subject_id: entry.snapshot.subject_id,
            trend_score: entry.snapshot.trend_score,
            components: entry.snapshot.components,
            reason,
            entity: entry.entity,
            calculated_at: entry.snapshot.calculated_at,
        }
    }
}

/// Response body for the trending list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrendingListResponse {
    /// Entries, score descending.
    pub data: Vec<TrendingEntryDto>,
    /// Scope of the list.
    pub scope: String,
    /// Period of the list.
    pub period: String,
    /// Number of entries.
    pub count: usize,
}
