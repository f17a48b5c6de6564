//! Job trigger: dispatches a named job for a target date under the tracker.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{DayWindow, Document, JobRun, JobType, Scope};
use crate::error::EngineError;
use crate::persistence::Stores;
use crate::service::aggregator::MetricAggregator;
use crate::service::job_tracker::JobRunTracker;
use crate::service::resolver::{RecommendationResolver, ResolveRequest};
use crate::service::scorer::TrendScorer;

/// Parses a job's target date.
///
/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, which is truncated to its
/// UTC date. A missing or blank value means the day before `now` (UTC).
///
/// # Errors
///
/// Returns [`EngineError::InvalidDate`] for anything else.
pub fn parse_target_date(raw: Option<&str>, now: DateTime<Utc>) -> Result<NaiveDate, EngineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now
            .date_naive()
            .pred_opt()
            .ok_or_else(|| EngineError::InvalidDate("no day before today".into()));
    };
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| EngineError::InvalidDate(format!("expected YYYY-MM-DD or RFC 3339, got {raw:?}")))
}

/// Runs named batch jobs, each wrapped in a [`JobRunTracker`].
#[derive(Debug, Clone)]
pub struct JobRunner {
    tracker: JobRunTracker,
    aggregator: MetricAggregator,
    scorer: TrendScorer,
    resolver: Arc<RecommendationResolver>,
}

impl JobRunner {
    /// Wires the jobs to `stores`. `seed_sample` resolves through `resolver`.
    #[must_use]
    pub fn new(stores: &Stores, resolver: Arc<RecommendationResolver>) -> Self {
        Self {
            tracker: JobRunTracker::new(Arc::clone(&stores.jobs)),
            aggregator: MetricAggregator::new(Arc::clone(&stores.events), Arc::clone(&stores.trends)),
            scorer: TrendScorer::new(Arc::clone(&stores.trends)),
            resolver,
        }
    }

    /// Validates `job` and `target_date`, then runs the job.
    ///
    /// Input is validated before any run row is written. A job that fails
    /// while running yields `Ok` with a `failed` run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedJob`] or [`EngineError::InvalidDate`]
    /// for bad input, or a persistence error when the run row itself cannot
    /// be written.
    pub async fn run(&self, job: &str, target_date: Option<&str>) -> Result<JobRun, EngineError> {
        let job_type: JobType = job.parse()?;
        let date = parse_target_date(target_date, Utc::now())?;
        self.run_job(job_type, date).await
    }

    /// Runs an already-validated job for `date`.
    ///
    /// # Errors
    ///
    /// See [`JobRunTracker::track`].
    pub async fn run_job(&self, job_type: JobType, date: NaiveDate) -> Result<JobRun, EngineError> {
        match job_type {
            JobType::TelemetryRollup => {
                let window = DayWindow::for_date(date);
                let initial = Document::new()
                    .with("target_date", date.to_string())
                    .with("window_start", window.start.to_rfc3339())
                    .with("window_end", window.end.to_rfc3339());
                let aggregator = self.aggregator.clone();
                self.tracker
                    .track(job_type, initial, async move {
                        let summary = aggregator.aggregate(&window).await?;
                        Ok(Document::new()
                            .with("card_metrics_updated", summary.card_metrics_updated)
                            .with("deck_metrics_updated", summary.deck_metrics_updated))
                    })
                    .await
            }
            JobType::TrendingRefresh => {
                let initial = Document::new().with("metric_date", date.to_string());
                let scorer = self.scorer.clone();
                self.tracker
                    .track(job_type, initial, async move {
                        let summary = scorer.refresh(date).await?;
                        Ok(Document::new()
                            .with("card_snapshots", summary.card_snapshots)
                            .with("deck_snapshots", summary.deck_snapshots))
                    })
                    .await
            }
            JobType::SeedSample => {
                let initial = Document::new().with("target_date", date.to_string());
                let resolver = Arc::clone(&self.resolver);
                self.tracker
                    .track(job_type, initial, async move {
                        let cards = resolver.resolve(&ResolveRequest::new(Scope::Card)).await?;
                        let decks = resolver.resolve(&ResolveRequest::new(Scope::Deck)).await?;
                        Ok(Document::new()
                            .with("card_seed_count", cards.meta.count)
                            .with("card_resolver", cards.meta.resolver)
                            .with("deck_seed_count", decks.meta.count)
                            .with("deck_resolver", decks.meta.resolver))
                    })
                    .await
            }
        }
    }
}
