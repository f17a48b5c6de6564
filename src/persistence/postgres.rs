//! PostgreSQL implementation of the store traits.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use super::models::{
    CardMetricRow, CardRow, DeckMetricRow, DeckRow, EventRow, JobRunRow, ModelRowRecord,
    SnapshotRow,
};
use super::{CatalogStore, EventFeed, JobRunStore, ModelFeed, TrendStore};
use crate::config::EngineConfig;
use crate::domain::{
    Card, CardDailyMetric, CardSearch, DayWindow, Deck, DeckDailyMetric, Document, EventType,
    JobRun, JobStatus, JobType, ModelRow, Period, RawEvent, Scope, TrendingSnapshot,
};
use crate::error::EngineError;

const CARD_COLUMNS: &str = "id, name, type_line, color_identity, legalities, image_uri";

const DECK_SELECT: &str = "SELECT d.id, d.name, d.format, d.color_identity, \
     COALESCE(array_agg(dc.card_id) FILTER (WHERE dc.card_id IS NOT NULL), '{}') AS card_ids \
     FROM decks d LEFT JOIN deck_cards dc ON dc.deck_id = d.id";

const SNAPSHOT_COLUMNS: &str =
    "scope, subject_id, period, trend_score::float8 AS trend_score, components, calculated_at";

const JOB_RUN_COLUMNS: &str =
    "id, job_type, status, metadata, error_message, started_at, completed_at";

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool sized from `config`, optionally applying migrations.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        if config.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("database migrations applied");
        }

        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Converts fallible rows, skipping (and logging) rows that fail.
fn convert_rows<R, T>(rows: Vec<R>, what: &'static str) -> Vec<T>
where
    T: TryFrom<R, Error = EngineError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(table = what, error = %e, "skipping malformed row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl EventFeed for PostgresStore {
    async fn events_in_window(
        &self,
        window: &DayWindow,
        types: &[EventType],
    ) -> Result<Vec<RawEvent>, EngineError> {
        let type_names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT event_type, subject_id, user_id, occurred_at, context \
             FROM telemetry_events \
             WHERE occurred_at >= $1 AND occurred_at < $2 \
               AND event_type = ANY($3) AND subject_id IS NOT NULL \
             ORDER BY occurred_at ASC",
        )
        .bind(window.start)
        .bind(window.end)
        .bind(&type_names)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RawEvent::from).collect())
    }
}

#[async_trait]
impl TrendStore for PostgresStore {
    async fn upsert_daily_metrics(
        &self,
        cards: &[CardDailyMetric],
        decks: &[DeckDailyMetric],
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;

        for m in cards {
            sqlx::query(
                "INSERT INTO card_daily_metrics \
                   (card_id, metric_date, views, unique_users, deck_inclusions, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, now()) \
                 ON CONFLICT (card_id, metric_date) DO UPDATE SET \
                   views = EXCLUDED.views, \
                   unique_users = EXCLUDED.unique_users, \
                   deck_inclusions = EXCLUDED.deck_inclusions, \
                   updated_at = now()",
            )
            .bind(m.card_id)
            .bind(m.metric_date)
            .bind(m.views)
            .bind(m.unique_users)
            .bind(m.deck_inclusions)
            .execute(&mut *tx)
            .await?;
        }

        for m in decks {
            sqlx::query(
                "INSERT INTO deck_daily_metrics \
                   (deck_id, metric_date, views, unique_users, imports, exports, \
                    bridge_requests, win_rate, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now()) \
                 ON CONFLICT (deck_id, metric_date) DO UPDATE SET \
                   views = EXCLUDED.views, \
                   unique_users = EXCLUDED.unique_users, \
                   imports = EXCLUDED.imports, \
                   exports = EXCLUDED.exports, \
                   bridge_requests = EXCLUDED.bridge_requests, \
                   win_rate = EXCLUDED.win_rate, \
                   updated_at = now()",
            )
            .bind(m.deck_id)
            .bind(m.metric_date)
            .bind(m.views)
            .bind(m.unique_users)
            .bind(m.imports)
            .bind(m.exports)
            .bind(m.bridge_requests)
            .bind(m.win_rate)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn card_metrics_on(&self, date: NaiveDate) -> Result<Vec<CardDailyMetric>, EngineError> {
        let rows = sqlx::query_as::<_, CardMetricRow>(
            "SELECT card_id, metric_date, views, unique_users, deck_inclusions, \
                    price_avg::text AS price_avg, price_change::text AS price_change \
             FROM card_daily_metrics WHERE metric_date = $1",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CardDailyMetric::from).collect())
    }

    async fn deck_metrics_on(&self, date: NaiveDate) -> Result<Vec<DeckDailyMetric>, EngineError> {
        let rows = sqlx::query_as::<_, DeckMetricRow>(
            "SELECT deck_id, metric_date, views, unique_users, imports, exports, \
                    bridge_requests, win_rate::float8 AS win_rate \
             FROM deck_daily_metrics WHERE metric_date = $1",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DeckDailyMetric::from).collect())
    }

    async fn upsert_snapshots(&self, snapshots: &[TrendingSnapshot]) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;

        for s in snapshots {
            sqlx::query(
                "INSERT INTO trending_snapshots \
                   (scope, subject_id, period, trend_score, components, calculated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (scope, subject_id, period) DO UPDATE SET \
                   trend_score = EXCLUDED.trend_score, \
                   components = EXCLUDED.components, \
                   calculated_at = EXCLUDED.calculated_at",
            )
            .bind(s.scope.as_str())
            .bind(s.subject_id)
            .bind(s.period.as_str())
            .bind(s.trend_score)
            .bind(Json(&s.components))
            .bind(s.calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn top_snapshots(
        &self,
        scope: Scope,
        period: Period,
        limit: usize,
    ) -> Result<Vec<TrendingSnapshot>, EngineError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM trending_snapshots \
             WHERE scope = $1 AND period = $2 \
             ORDER BY trend_score DESC, subject_id ASC LIMIT $3"
        ))
        .bind(scope.as_str())
        .bind(period.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows, "trending_snapshots"))
    }

    async fn trend_scores(
        &self,
        scope: Scope,
        period: Period,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, f64>, EngineError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, f64)>(
            "SELECT subject_id, trend_score::float8 FROM trending_snapshots \
             WHERE scope = $1 AND period = $2 AND subject_id = ANY($3)",
        )
        .bind(scope.as_str())
        .bind(period.as_str())
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl JobRunStore for PostgresStore {
    async fn start_run(
        &self,
        job_type: JobType,
        metadata: &Document,
    ) -> Result<JobRun, EngineError> {
        let row = sqlx::query_as::<_, JobRunRow>(&format!(
            "INSERT INTO job_runs (id, job_type, status, metadata, started_at) \
             VALUES ($1, $2, 'running', $3, now()) RETURNING {JOB_RUN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(job_type.as_str())
        .bind(Json(metadata))
        .fetch_one(&self.pool)
        .await?;

        JobRun::try_from(row)
    }

    async fn finish_run(
        &self,
        id: Uuid,
        status: JobStatus,
        metadata: &Document,
        error_message: Option<&str>,
    ) -> Result<JobRun, EngineError> {
        let row = sqlx::query_as::<_, JobRunRow>(&format!(
            "UPDATE job_runs SET status = $2, metadata = $3, error_message = $4, \
                    completed_at = now() \
             WHERE id = $1 AND status = 'running' RETURNING {JOB_RUN_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(Json(metadata))
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;

        row.map_or(Err(EngineError::JobRunNotFound(id)), JobRun::try_from)
    }

    async fn recent_runs(
        &self,
        job_type: Option<JobType>,
        limit: usize,
    ) -> Result<Vec<JobRun>, EngineError> {
        let rows = sqlx::query_as::<_, JobRunRow>(&format!(
            "SELECT {JOB_RUN_COLUMNS} FROM job_runs \
             WHERE ($1::text IS NULL OR job_type = $1) \
             ORDER BY started_at DESC LIMIT $2"
        ))
        .bind(job_type.map(|j| j.as_str()))
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows, "job_runs"))
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn card(&self, id: Uuid) -> Result<Option<Card>, EngineError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Card::from))
    }

    async fn deck(&self, id: Uuid) -> Result<Option<Deck>, EngineError> {
        let row = sqlx::query_as::<_, DeckRow>(&format!(
            "{DECK_SELECT} WHERE d.id = $1 GROUP BY d.id"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Deck::from))
    }

    async fn cards_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Card>, EngineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Card::from).collect())
    }

    async fn decks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Deck>, EngineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, DeckRow>(&format!(
            "{DECK_SELECT} WHERE d.id = ANY($1) GROUP BY d.id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Deck::from).collect())
    }

    async fn search_cards(&self, search: &CardSearch) -> Result<Vec<Card>, EngineError> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards \
             WHERE (CASE WHEN cardinality($1::text[]) = 0 \
                         THEN cardinality(color_identity) = 0 \
                         ELSE color_identity && $1::text[] END) \
               AND ($2::text IS NULL OR type_line ILIKE '%' || $2 || '%') \
               AND ($3::text IS NULL OR legalities ->> $3 = 'legal') \
               AND NOT (id = ANY($4::uuid[])) \
             ORDER BY (SELECT ts.trend_score FROM trending_snapshots ts \
                       WHERE ts.scope = 'card' AND ts.period = $6 \
                         AND ts.subject_id = cards.id) DESC NULLS LAST, \
                      name ASC, id ASC \
             LIMIT $5"
        ))
        .bind(&search.colors)
        .bind(search.type_token.as_deref())
        .bind(search.format.as_deref())
        .bind(&search.exclude)
        .bind(sql_limit(search.limit))
        .bind(search.rank_period.map(|p| p.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Card::from).collect())
    }
}

#[async_trait]
impl ModelFeed for PostgresStore {
    async fn similar_cards(
        &self,
        card_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ModelRow>, EngineError> {
        let rows = sqlx::query_as::<_, ModelRowRecord>(
            "SELECT card_id AS subject_id, similar_card_id AS target_id, score, rationale, components \
             FROM card_similarity_edges WHERE card_id = $1 \
             ORDER BY score DESC LIMIT $2",
        )
        .bind(card_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ModelRow::from).collect())
    }

    async fn deck_upgrades(
        &self,
        deck_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ModelRow>, EngineError> {
        let rows = sqlx::query_as::<_, ModelRowRecord>(
            "SELECT deck_id AS subject_id, card_id AS target_id, score, rationale, components \
             FROM deck_upgrade_candidates WHERE deck_id = $1 \
             ORDER BY score DESC LIMIT $2",
        )
        .bind(deck_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ModelRow::from).collect())
    }
}
