//! In-memory implementation of every store trait.
//!
//! Tables live behind a single [`tokio::sync::RwLock`], so each write is
//! atomic with respect to readers. Used by tests and by `--store memory`
//! for local runs. Outage switches let callers simulate an unavailable
//! backend per concern.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, EventFeed, JobRunStore, ModelFeed, TrendStore};
use crate::domain::{
    Card, CardDailyMetric, CardSearch, DayWindow, Deck, DeckDailyMetric, Document, EventType,
    JobRun, JobStatus, JobType, ModelRow, Period, RawEvent, Scope, TrendingSnapshot,
};
use crate::error::EngineError;

/// Simulated outages, one switch per concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outage {
    /// Event feed calls fail.
    pub events: bool,
    /// Metric and snapshot calls fail.
    pub trends: bool,
    /// Job-run calls fail.
    pub jobs: bool,
    /// Catalog calls fail.
    pub catalog: bool,
    /// Model feed calls fail.
    pub models: bool,
}

impl Outage {
    /// Every concern unavailable.
    #[must_use]
    pub const fn total() -> Self {
        Self {
            events: true,
            trends: true,
            jobs: true,
            catalog: true,
            models: true,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    events: Vec<RawEvent>,
    card_metrics: BTreeMap<(Uuid, NaiveDate), CardDailyMetric>,
    deck_metrics: BTreeMap<(Uuid, NaiveDate), DeckDailyMetric>,
    snapshots: HashMap<(Scope, Uuid, Period), TrendingSnapshot>,
    job_runs: Vec<JobRun>,
    cards: HashMap<Uuid, Card>,
    decks: HashMap<Uuid, Deck>,
    similar_cards: Vec<ModelRow>,
    deck_upgrades: Vec<ModelRow>,
    outage: Outage,
    metric_writes: usize,
}

/// Process-local store backing every engine concern.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

fn unavailable(what: &str) -> EngineError {
    EngineError::Persistence(format!("{what} store unavailable"))
}

fn by_score_desc(rows: &[ModelRow], subject: Uuid, limit: usize) -> Vec<ModelRow> {
    let mut out: Vec<ModelRow> = rows
        .iter()
        .filter(|r| r.subject_id == subject)
        .cloned()
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(limit);
    out
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the outage switches.
    pub async fn set_outage(&self, outage: Outage) {
        self.tables.write().await.outage = outage;
    }

    /// Appends raw events.
    pub async fn insert_events(&self, events: impl IntoIterator<Item = RawEvent> + Send) {
        self.tables.write().await.events.extend(events);
    }

    /// Inserts or replaces catalog cards.
    pub async fn insert_cards(&self, cards: impl IntoIterator<Item = Card> + Send) {
        let mut t = self.tables.write().await;
        for card in cards {
            t.cards.insert(card.id, card);
        }
    }

    /// Inserts or replaces catalog decks.
    pub async fn insert_decks(&self, decks: impl IntoIterator<Item = Deck> + Send) {
        let mut t = self.tables.write().await;
        for deck in decks {
            t.decks.insert(deck.id, deck);
        }
    }

    /// Appends precomputed similarity edges.
    pub async fn insert_similar_cards(&self, rows: impl IntoIterator<Item = ModelRow> + Send) {
        self.tables.write().await.similar_cards.extend(rows);
    }

    /// Appends precomputed deck-upgrade candidates.
    pub async fn insert_deck_upgrades(&self, rows: impl IntoIterator<Item = ModelRow> + Send) {
        self.tables.write().await.deck_upgrades.extend(rows);
    }

    /// Writes a full card metric row, price columns included, as the
    /// pricing feed would.
    pub async fn put_card_metric(&self, metric: CardDailyMetric) {
        self.tables
            .write()
            .await
            .card_metrics
            .insert((metric.card_id, metric.metric_date), metric);
    }

    /// Writes a full deck metric row.
    pub async fn put_deck_metric(&self, metric: DeckDailyMetric) {
        self.tables
            .write()
            .await
            .deck_metrics
            .insert((metric.deck_id, metric.metric_date), metric);
    }

    /// Every stored card metric row, ordered by `(card, date)`.
    pub async fn all_card_metrics(&self) -> Vec<CardDailyMetric> {
        self.tables.read().await.card_metrics.values().cloned().collect()
    }

    /// Every stored deck metric row, ordered by `(deck, date)`.
    pub async fn all_deck_metrics(&self) -> Vec<DeckDailyMetric> {
        self.tables.read().await.deck_metrics.values().cloned().collect()
    }

    /// Every stored snapshot, in no particular order.
    pub async fn all_snapshots(&self) -> Vec<TrendingSnapshot> {
        self.tables.read().await.snapshots.values().cloned().collect()
    }

    /// Number of metric upsert batches accepted so far.
    pub async fn metric_write_batches(&self) -> usize {
        self.tables.read().await.metric_writes
    }
}

#[async_trait]
impl EventFeed for InMemoryStore {
    async fn events_in_window(
        &self,
        window: &DayWindow,
        types: &[EventType],
    ) -> Result<Vec<RawEvent>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.events {
            return Err(unavailable("event"));
        }
        Ok(t.events
            .iter()
            .filter(|e| window.contains(e.occurred_at))
            .filter(|e| e.subject_id.is_some())
            .filter(|e| e.kind().is_some_and(|k| types.contains(&k)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TrendStore for InMemoryStore {
    async fn upsert_daily_metrics(
        &self,
        cards: &[CardDailyMetric],
        decks: &[DeckDailyMetric],
    ) -> Result<(), EngineError> {
        let mut t = self.tables.write().await;
        if t.outage.trends {
            return Err(unavailable("trend"));
        }
        for card in cards {
            let key = (card.card_id, card.metric_date);
            let (price_avg, price_change) = t
                .card_metrics
                .get(&key)
                .map(|m| (m.price_avg.clone(), m.price_change.clone()))
                .unwrap_or_default();
            t.card_metrics.insert(
                key,
                CardDailyMetric {
                    price_avg,
                    price_change,
                    ..card.clone()
                },
            );
        }
        for deck in decks {
            t.deck_metrics
                .insert((deck.deck_id, deck.metric_date), deck.clone());
        }
        t.metric_writes = t.metric_writes.saturating_add(1);
        Ok(())
    }

    async fn card_metrics_on(&self, date: NaiveDate) -> Result<Vec<CardDailyMetric>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.trends {
            return Err(unavailable("trend"));
        }
        Ok(t.card_metrics
            .values()
            .filter(|m| m.metric_date == date)
            .cloned()
            .collect())
    }

    async fn deck_metrics_on(&self, date: NaiveDate) -> Result<Vec<DeckDailyMetric>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.trends {
            return Err(unavailable("trend"));
        }
        Ok(t.deck_metrics
            .values()
            .filter(|m| m.metric_date == date)
            .cloned()
            .collect())
    }

    async fn upsert_snapshots(&self, snapshots: &[TrendingSnapshot]) -> Result<(), EngineError> {
        let mut t = self.tables.write().await;
        if t.outage.trends {
            return Err(unavailable("trend"));
        }
        for s in snapshots {
            t.snapshots
                .insert((s.scope, s.subject_id, s.period), s.clone());
        }
        Ok(())
    }

    async fn top_snapshots(
        &self,
        scope: Scope,
        period: Period,
        limit: usize,
    ) -> Result<Vec<TrendingSnapshot>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.trends {
            return Err(unavailable("trend"));
        }
        let mut rows: Vec<TrendingSnapshot> = t
            .snapshots
            .values()
            .filter(|s| s.scope == scope && s.period == period)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.trend_score
                .total_cmp(&a.trend_score)
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn trend_scores(
        &self,
        scope: Scope,
        period: Period,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, f64>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.trends {
            return Err(unavailable("trend"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                t.snapshots
                    .get(&(scope, *id, period))
                    .map(|s| (*id, s.trend_score))
            })
            .collect())
    }
}

#[async_trait]
impl JobRunStore for InMemoryStore {
    async fn start_run(
        &self,
        job_type: JobType,
        metadata: &Document,
    ) -> Result<JobRun, EngineError> {
        let mut t = self.tables.write().await;
        if t.outage.jobs {
            return Err(unavailable("job-run"));
        }
        let run = JobRun {
            id: Uuid::new_v4(),
            job_type,
            status: JobStatus::Running,
            metadata: metadata.clone(),
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        t.job_runs.push(run.clone());
        Ok(run)
    }

    async fn finish_run(
        &self,
        id: Uuid,
        status: JobStatus,
        metadata: &Document,
        error_message: Option<&str>,
    ) -> Result<JobRun, EngineError> {
        let mut t = self.tables.write().await;
        if t.outage.jobs {
            return Err(unavailable("job-run"));
        }
        let run = t
            .job_runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(EngineError::JobRunNotFound(id))?;
        if run.status.is_terminal() {
            return Err(EngineError::Internal(format!(
                "job run {id} already finalized as {}",
                run.status.as_str()
            )));
        }
        run.status = status;
        run.metadata = metadata.clone();
        run.error_message = error_message.map(str::to_string);
        run.completed_at = Some(Utc::now());
        Ok(run.clone())
    }

    async fn recent_runs(
        &self,
        job_type: Option<JobType>,
        limit: usize,
    ) -> Result<Vec<JobRun>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.jobs {
            return Err(unavailable("job-run"));
        }
        Ok(t.job_runs
            .iter()
            .rev()
            .filter(|r| job_type.is_none_or(|j| r.job_type == j))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn card(&self, id: Uuid) -> Result<Option<Card>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.catalog {
            return Err(unavailable("catalog"));
        }
        Ok(t.cards.get(&id).cloned())
    }

    async fn deck(&self, id: Uuid) -> Result<Option<Deck>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.catalog {
            return Err(unavailable("catalog"));
        }
        Ok(t.decks.get(&id).cloned())
    }

    async fn cards_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Card>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.catalog {
            return Err(unavailable("catalog"));
        }
        Ok(ids.iter().filter_map(|id| t.cards.get(id).cloned()).collect())
    }

    async fn decks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Deck>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.catalog {
            return Err(unavailable("catalog"));
        }
        Ok(ids.iter().filter_map(|id| t.decks.get(id).cloned()).collect())
    }

    async fn search_cards(&self, search: &CardSearch) -> Result<Vec<Card>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.catalog {
            return Err(unavailable("catalog"));
        }
        let mut hits: Vec<Card> = t
            .cards
            .values()
            .filter(|c| search.matches(c))
            .cloned()
            .collect();
        let score = |card: &Card| {
            search.rank_period.and_then(|period| {
                t.snapshots
                    .get(&(Scope::Card, card.id, period))
                    .map(|s| s.trend_score)
            })
        };
        hits.sort_by(|a, b| {
            let by_score = match (score(a), score(b)) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_score
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(search.limit);
        Ok(hits)
    }
}

#[async_trait]
impl ModelFeed for InMemoryStore {
    async fn similar_cards(
        &self,
        card_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ModelRow>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.models {
            return Err(unavailable("model"));
        }
        Ok(by_score_desc(&t.similar_cards, card_id, limit))
    }

    async fn deck_upgrades(
        &self,
        deck_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ModelRow>, EngineError> {
        let t = self.tables.read().await;
        if t.outage.models {
            return Err(unavailable("model"));
        }
        Ok(by_score_desc(&t.deck_upgrades, deck_id, limit))
    }
}
