//! Trend scorer: one day of metric rows into trending snapshots.
//!
//! The weights below are part of the scoring contract. Scores must be
//! reproducible to four decimal places from the same metric rows.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    CardDailyMetric, DeckDailyMetric, Document, Period, RefreshSummary, Scope, TrendingSnapshot,
};
use crate::error::EngineError;
use crate::persistence::TrendStore;

/// Card weight on `views`.
pub const CARD_VIEWS_WEIGHT: f64 = 0.4;
/// Card weight on `deck_inclusions`.
pub const CARD_DECK_INCLUSIONS_WEIGHT: f64 = 0.4;
/// Card weight on `price_growth`.
pub const CARD_PRICE_GROWTH_WEIGHT: f64 = 0.2;

/// Deck weight on `views`.
pub const DECK_VIEWS_WEIGHT: f64 = 0.35;
/// Deck weight on `imports`.
pub const DECK_IMPORTS_WEIGHT: f64 = 0.25;
/// Deck weight on `exports`.
pub const DECK_EXPORTS_WEIGHT: f64 = 0.2;
/// Deck weight on `bridge_requests`.
pub const DECK_BRIDGE_REQUESTS_WEIGHT: f64 = 0.1;
/// Deck weight on `win_rate`.
pub const DECK_WIN_RATE_WEIGHT: f64 = 0.1;

/// Rounds to 4 fraction digits.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Rounds to 2 fraction digits.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(n: i64) -> f64 {
    n as f64
}

fn parse_decimal(raw: Option<&str>, field: &str) -> Result<Option<f64>, EngineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| EngineError::MalformedMetric(format!("unparseable {field}: {raw:?}")))
}

/// `price_change / price_avg`, or 0 when the average is zero or absent.
///
/// # Errors
///
/// Returns [`EngineError::MalformedMetric`] when a present price column is
/// not a finite decimal.
pub fn price_growth(metric: &CardDailyMetric) -> Result<f64, EngineError> {
    let avg = parse_decimal(metric.price_avg.as_deref(), "price_avg")?;
    let change = parse_decimal(metric.price_change.as_deref(), "price_change")?;
    Ok(match (avg, change) {
        (Some(avg), Some(change)) if avg != 0.0 => change / avg,
        _ => 0.0,
    })
}

/// Card trend score and its components.
///
/// # Errors
///
/// Returns an error when the row's price columns are malformed.
pub fn score_card(metric: &CardDailyMetric) -> Result<(f64, Document), EngineError> {
    let growth = price_growth(metric)?;
    let score = round4(
        as_f64(metric.views) * CARD_VIEWS_WEIGHT
            + as_f64(metric.deck_inclusions) * CARD_DECK_INCLUSIONS_WEIGHT
            + growth * CARD_PRICE_GROWTH_WEIGHT,
    );
    let components = Document::new()
        .with("views", metric.views)
        .with("deck_inclusions", metric.deck_inclusions)
        .with("price_growth", round4(growth));
    Ok((score, components))
}

/// Deck trend score and its components. A missing win rate counts as 0.
///
/// # Errors
///
/// Returns an error when the row's win rate is not finite.
pub fn score_deck(metric: &DeckDailyMetric) -> Result<(f64, Document), EngineError> {
    let win_rate = metric.win_rate.unwrap_or(0.0);
    if !win_rate.is_finite() {
        return Err(EngineError::MalformedMetric(format!(
            "non-finite win_rate for deck {}",
            metric.deck_id
        )));
    }
    let score = round4(
        as_f64(metric.views) * DECK_VIEWS_WEIGHT
            + as_f64(metric.imports) * DECK_IMPORTS_WEIGHT
            + as_f64(metric.exports) * DECK_EXPORTS_WEIGHT
            + as_f64(metric.bridge_requests) * DECK_BRIDGE_REQUESTS_WEIGHT
            + win_rate * DECK_WIN_RATE_WEIGHT,
    );
    let components = Document::new()
        .with("views", metric.views)
        .with("imports", metric.imports)
        .with("exports", metric.exports)
        .with("bridge_requests", metric.bridge_requests)
        .with("win_rate", round2(win_rate));
    Ok((score, components))
}

/// Builds daily snapshots for every row that scores cleanly. Malformed rows
/// are logged and skipped.
#[must_use]
pub fn build_snapshots(
    cards: &[CardDailyMetric],
    decks: &[DeckDailyMetric],
    calculated_at: DateTime<Utc>,
) -> (Vec<TrendingSnapshot>, RefreshSummary) {
    let snapshot = |scope, subject_id, (trend_score, components)| TrendingSnapshot {
        scope,
        subject_id,
        period: Period::Daily,
        trend_score,
        components,
        calculated_at,
    };

    let mut out = Vec::with_capacity(cards.len().saturating_add(decks.len()));
    let mut summary = RefreshSummary::default();

    for m in cards {
        match score_card(m) {
            Ok(scored) => {
                out.push(snapshot(Scope::Card, m.card_id, scored));
                summary.card_snapshots = summary.card_snapshots.saturating_add(1);
            }
            Err(e) => tracing::warn!(card_id = %m.card_id, error = %e, "skipping card metric row"),
        }
    }
    for m in decks {
        match score_deck(m) {
            Ok(scored) => {
                out.push(snapshot(Scope::Deck, m.deck_id, scored));
                summary.deck_snapshots = summary.deck_snapshots.saturating_add(1);
            }
            Err(e) => tracing::warn!(deck_id = %m.deck_id, error = %e, "skipping deck metric row"),
        }
    }

    (out, summary)
}

/// Reads one day of metrics and overwrites the daily trending snapshots.
#[derive(Debug, Clone)]
pub struct TrendScorer {
    trends: Arc<dyn TrendStore>,
}

impl TrendScorer {
    /// Creates a scorer over the given store.
    #[must_use]
    pub fn new(trends: Arc<dyn TrendStore>) -> Self {
        Self { trends }
    }

    /// Scores every metric row dated `metric_date` and upserts the snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when reading metrics or writing
    /// snapshots fails. Malformed individual rows do not fail the run.
    pub async fn refresh(&self, metric_date: NaiveDate) -> Result<RefreshSummary, EngineError> {
        let cards = self.trends.card_metrics_on(metric_date).await?;
        let decks = self.trends.deck_metrics_on(metric_date).await?;

        let (snapshots, summary) = build_snapshots(&cards, &decks, Utc::now());
        if !snapshots.is_empty() {
            self.trends.upsert_snapshots(&snapshots).await?;
        }

        let skipped = cards
            .len()
            .saturating_add(decks.len())
            .saturating_sub(snapshots.len());
        tracing::info!(
            %metric_date,
            card_snapshots = summary.card_snapshots,
            deck_snapshots = summary.deck_snapshots,
            skipped,
            "trending snapshots refreshed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        let Some(d) = NaiveDate::from_ymd_opt(2026, 4, 2) else {
            panic!("valid date");
        };
        d
    }

    #[test]
    fn deck_score_matches_documented_example() {
        let m = DeckDailyMetric {
            views: 100,
            imports: 20,
            exports: 10,
            bridge_requests: 5,
            win_rate: Some(0.6),
            ..DeckDailyMetric::new(Uuid::new_v4(), date())
        };
        let Ok((score, components)) = score_deck(&m) else {
            panic!("scoring failed");
        };
        assert_eq!(score, 42.56);
        assert_eq!(components.get_f64("win_rate"), Some(0.6));
        assert_eq!(components.get_i64("bridge_requests"), Some(5));
    }

    #[test]
    fn card_score_includes_price_growth() {
        let m = CardDailyMetric {
            views: 10,
            deck_inclusions: 5,
            price_avg: Some("4.00".into()),
            price_change: Some("1.00".into()),
            ..CardDailyMetric::new(Uuid::new_v4(), date())
        };
        let Ok((score, components)) = score_card(&m) else {
            panic!("scoring failed");
        };
        // 10*0.4 + 5*0.4 + 0.25*0.2
        assert_eq!(score, 6.05);
        assert_eq!(components.get_f64("price_growth"), Some(0.25));
    }

    #[test]
    fn zero_or_missing_average_means_no_growth() {
        let zero = CardDailyMetric {
            price_avg: Some("0".into()),
            price_change: Some("3".into()),
            ..CardDailyMetric::new(Uuid::new_v4(), date())
        };
        let missing = CardDailyMetric::new(Uuid::new_v4(), date());
        assert_eq!(price_growth(&zero).ok(), Some(0.0));
        assert_eq!(price_growth(&missing).ok(), Some(0.0));
    }

    #[test]
    fn malformed_row_is_skipped_not_fatal() {
        let good = CardDailyMetric {
            views: 1,
            ..CardDailyMetric::new(Uuid::new_v4(), date())
        };
        let bad = CardDailyMetric {
            price_avg: Some("twelve".into()),
            ..CardDailyMetric::new(Uuid::new_v4(), date())
        };
        assert!(matches!(
            score_card(&bad),
            Err(EngineError::MalformedMetric(_))
        ));
        let nan_deck = DeckDailyMetric {
            win_rate: Some(f64::NAN),
            ..DeckDailyMetric::new(Uuid::new_v4(), date())
        };
        assert!(matches!(
            score_deck(&nan_deck),
            Err(EngineError::MalformedMetric(_))
        ));

        let (snapshots, summary) = build_snapshots(&[good, bad], &[nan_deck], Utc::now());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(summary.card_snapshots, 1);
        assert_eq!(summary.deck_snapshots, 0);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round2(0.666), 0.67);
    }
}
