//! Database row types and their conversion into domain values.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::{
    Card, CardDailyMetric, Deck, DeckDailyMetric, Document, JobRun, ModelRow, RawEvent,
    TrendingSnapshot,
};
use crate::error::EngineError;

/// A row from `telemetry_events`.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    /// Event type string.
    pub event_type: String,
    /// Subject id as stored (may be malformed).
    pub subject_id: Option<String>,
    /// Acting user.
    pub user_id: Option<String>,
    /// Event timestamp.
    pub occurred_at: DateTime<Utc>,
    /// JSONB context.
    pub context: Json<Document>,
}

impl From<EventRow> for RawEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_type: row.event_type,
            subject_id: row.subject_id,
            user_id: row.user_id,
            occurred_at: row.occurred_at,
            context: row.context.0,
        }
    }
}

/// A row from `card_daily_metrics`, price columns read as text.
#[derive(Debug, Clone, FromRow)]
pub struct CardMetricRow {
    /// Card id.
    pub card_id: Uuid,
    /// Metric day.
    pub metric_date: NaiveDate,
    /// View count.
    pub views: i64,
    /// Distinct viewers.
    pub unique_users: i64,
    /// Deck inclusion count.
    pub deck_inclusions: i64,
    /// `price_avg::text`.
    pub price_avg: Option<String>,
    /// `price_change::text`.
    pub price_change: Option<String>,
}

impl From<CardMetricRow> for CardDailyMetric {
    fn from(row: CardMetricRow) -> Self {
        Self {
            card_id: row.card_id,
            metric_date: row.metric_date,
            views: row.views,
            unique_users: row.unique_users,
            deck_inclusions: row.deck_inclusions,
            price_avg: row.price_avg,
            price_change: row.price_change,
        }
    }
}

/// A row from `deck_daily_metrics`.
#[derive(Debug, Clone, FromRow)]
pub struct DeckMetricRow {
    /// Deck id.
    pub deck_id: Uuid,
    /// Metric day.
    pub metric_date: NaiveDate,
    /// View count.
    pub views: i64,
    /// Distinct users.
    pub unique_users: i64,
    /// Import count.
    pub imports: i64,
    /// Export count.
    pub exports: i64,
    /// Bridge request count.
    pub bridge_requests: i64,
    /// `win_rate::float8`.
    pub win_rate: Option<f64>,
}

impl From<DeckMetricRow> for DeckDailyMetric {
    fn from(row: DeckMetricRow) -> Self {
        Self {
            deck_id: row.deck_id,
            metric_date: row.metric_date,
            views: row.views,
            unique_users: row.unique_users,
            imports: row.imports,
            exports: row.exports,
            bridge_requests: row.bridge_requests,
            win_rate: row.win_rate,
        }
    }
}

/// A row from `trending_snapshots`.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    /// Scope string.
    pub scope: String,
    /// Subject id.
    pub subject_id: Uuid,
    /// Period string.
    pub period: String,
    /// `trend_score::float8`.
    pub trend_score: f64,
    /// JSONB components.
    pub components: Json<Document>,
    /// Calculation time.
    pub calculated_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for TrendingSnapshot {
    type Error = EngineError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            scope: row.scope.parse()?,
            subject_id: row.subject_id,
            period: row.period.parse()?,
            trend_score: row.trend_score,
            components: row.components.0,
            calculated_at: row.calculated_at,
        })
    }
}

/// A row from `job_runs`.
#[derive(Debug, Clone, FromRow)]
pub struct JobRunRow {
    /// Run id.
    pub id: Uuid,
    /// Job name.
    pub job_type: String,
    /// Status string.
    pub status: String,
    /// JSONB metadata.
    pub metadata: Json<Document>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finalization time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRunRow> for JobRun {
    type Error = EngineError;

    fn try_from(row: JobRunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_type: row.job_type.parse()?,
            status: row.status.parse()?,
            metadata: row.metadata.0,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// A row from `cards`.
#[derive(Debug, Clone, FromRow)]
pub struct CardRow {
    /// Card id.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// Type line.
    pub type_line: String,
    /// Color identity array.
    pub color_identity: Vec<String>,
    /// JSONB legality map.
    pub legalities: Json<BTreeMap<String, String>>,
    /// Image URI.
    pub image_uri: Option<String>,
}

impl From<CardRow> for Card {
    fn from(row: CardRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            type_line: row.type_line,
            color_identity: row.color_identity,
            legalities: row.legalities.0,
            image_uri: row.image_uri,
        }
    }
}

/// A row from `decks` joined with its aggregated card ids.
#[derive(Debug, Clone, FromRow)]
pub struct DeckRow {
    /// Deck id.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// Declared format.
    pub format: Option<String>,
    /// Color identity array.
    pub color_identity: Vec<String>,
    /// `array_agg` of `deck_cards.card_id`.
    pub card_ids: Vec<Uuid>,
}

impl From<DeckRow> for Deck {
    fn from(row: DeckRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            format: row.format.map(|f| f.to_ascii_lowercase()),
            color_identity: row.color_identity,
            card_ids: row.card_ids,
        }
    }
}

/// A row from `card_similarity_edges` or `deck_upgrade_candidates`.
#[derive(Debug, Clone, FromRow)]
pub struct ModelRowRecord {
    /// Source card or deck.
    pub subject_id: Uuid,
    /// Recommended card.
    pub target_id: Uuid,
    /// Model score.
    pub score: f64,
    /// Free-text rationale.
    pub rationale: Option<String>,
    /// JSONB sub-scores.
    pub components: Option<Json<Document>>,
}

impl From<ModelRowRecord> for ModelRow {
    fn from(row: ModelRowRecord) -> Self {
        Self {
            subject_id: row.subject_id,
            target_id: row.target_id,
            score: row.score,
            rationale: row.rationale,
            components: row.components.map(|c| c.0).unwrap_or_default(),
        }
    }
}
