//! Persistence layer: store traits plus in-memory and PostgreSQL backends.
//!
//! The engine reads events, catalog rows and model rows, and writes daily
//! metrics, trending snapshots and job runs. Each concern is a separate
//! object-safe trait so jobs and the resolver can be exercised against
//! [`memory::InMemoryStore`] in tests and [`postgres::PostgresStore`] in
//! production.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    Card, CardDailyMetric, CardSearch, DayWindow, Deck, DeckDailyMetric, Document, EventType,
    JobRun, JobStatus, JobType, ModelRow, Period, RawEvent, Scope, TrendingSnapshot,
};
use crate::error::EngineError;

/// Read access to persisted telemetry events.
#[async_trait]
pub trait EventFeed: Send + Sync + fmt::Debug {
    /// Events with `occurred_at` in `[window.start, window.end)` whose type is
    /// one of `types` and whose subject id is non-null.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn events_in_window(
        &self,
        window: &DayWindow,
        types: &[EventType],
    ) -> Result<Vec<RawEvent>, EngineError>;
}

/// Daily metrics and trending snapshots.
#[async_trait]
pub trait TrendStore: Send + Sync + fmt::Debug {
    /// Creates or replaces the counters of every given row, as one atomic
    /// write. Externally maintained price columns are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn upsert_daily_metrics(
        &self,
        cards: &[CardDailyMetric],
        decks: &[DeckDailyMetric],
    ) -> Result<(), EngineError>;

    /// Card metric rows dated `date`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn card_metrics_on(&self, date: NaiveDate) -> Result<Vec<CardDailyMetric>, EngineError>;

    /// Deck metric rows dated `date`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn deck_metrics_on(&self, date: NaiveDate) -> Result<Vec<DeckDailyMetric>, EngineError>;

    /// Creates or overwrites snapshots keyed by `(scope, subject, period)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn upsert_snapshots(&self, snapshots: &[TrendingSnapshot]) -> Result<(), EngineError>;

    /// Highest-scoring snapshots for a scope and period, score descending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn top_snapshots(
        &self,
        scope: Scope,
        period: Period,
        limit: usize,
    ) -> Result<Vec<TrendingSnapshot>, EngineError>;

    /// Trend scores for the given subjects. Subjects without a snapshot are
    /// absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn trend_scores(
        &self,
        scope: Scope,
        period: Period,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, f64>, EngineError>;
}

/// Job-run bookkeeping.
#[async_trait]
pub trait JobRunStore: Send + Sync + fmt::Debug {
    /// Inserts a new run in `running` state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn start_run(&self, job_type: JobType, metadata: &Document)
    -> Result<JobRun, EngineError>;

    /// Moves a running run to a terminal state, replacing its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error when no run with `id` is still running, or
    /// [`EngineError::Persistence`] on backend failure.
    async fn finish_run(
        &self,
        id: Uuid,
        status: JobStatus,
        metadata: &Document,
        error_message: Option<&str>,
    ) -> Result<JobRun, EngineError>;

    /// Most recent runs first, optionally restricted to one job type.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn recent_runs(
        &self,
        job_type: Option<JobType>,
        limit: usize,
    ) -> Result<Vec<JobRun>, EngineError>;
}

/// Read-only card and deck catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync + fmt::Debug {
    /// Card by id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn card(&self, id: Uuid) -> Result<Option<Card>, EngineError>;

    /// Deck by id, including its card list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn deck(&self, id: Uuid) -> Result<Option<Deck>, EngineError>;

    /// Cards by id, in no particular order. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn cards_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Card>, EngineError>;

    /// Decks by id, in no particular order. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn decks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Deck>, EngineError>;

    /// Attribute search for heuristic candidates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn search_cards(&self, search: &CardSearch) -> Result<Vec<Card>, EngineError>;
}

/// Precomputed similarity and upgrade rows.
#[async_trait]
pub trait ModelFeed: Send + Sync + fmt::Debug {
    /// Similarity edges from `card_id`, score descending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn similar_cards(&self, card_id: Uuid, limit: usize)
    -> Result<Vec<ModelRow>, EngineError>;

    /// Upgrade candidates for `deck_id`, score descending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the backend is unavailable.
    async fn deck_upgrades(&self, deck_id: Uuid, limit: usize)
    -> Result<Vec<ModelRow>, EngineError>;
}

/// Bundle of store handles injected into services.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Telemetry feed.
    pub events: Arc<dyn EventFeed>,
    /// Metric and snapshot tables.
    pub trends: Arc<dyn TrendStore>,
    /// Job-run table.
    pub jobs: Arc<dyn JobRunStore>,
    /// Catalog reference data.
    pub catalog: Arc<dyn CatalogStore>,
    /// Model output feed.
    pub models: Arc<dyn ModelFeed>,
}

impl Stores {
    /// Uses one backend for every concern.
    #[must_use]
    pub fn shared<S>(store: &Arc<S>) -> Self
    where
        S: EventFeed + TrendStore + JobRunStore + CatalogStore + ModelFeed + 'static,
    {
        Self {
            events: Arc::clone(store) as Arc<dyn EventFeed>,
            trends: Arc::clone(store) as Arc<dyn TrendStore>,
            jobs: Arc::clone(store) as Arc<dyn JobRunStore>,
            catalog: Arc::clone(store) as Arc<dyn CatalogStore>,
            models: Arc::clone(store) as Arc<dyn ModelFeed>,
        }
    }
}
