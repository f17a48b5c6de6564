//! Per-subject daily metric rows.
//!
//! One row per `(subject, metric_date)`. Rows are created or replaced by the
//! aggregator only; the scorer reads them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Daily counters for one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDailyMetric {
    /// Card id.
    pub card_id: Uuid,
    /// UTC day the counters cover.
    pub metric_date: NaiveDate,
    /// `card_viewed` count.
    pub views: i64,
    /// Distinct non-null users across `card_viewed` events.
    pub unique_users: i64,
    /// `deck_card_added` count.
    pub deck_inclusions: i64,
    /// Average price for the day as a decimal string. Maintained by the
    /// pricing feed; the aggregator never writes it.
    pub price_avg: Option<String>,
    /// Price change over the day as a decimal string. Maintained by the
    /// pricing feed; the aggregator never writes it.
    pub price_change: Option<String>,
}

impl CardDailyMetric {
    /// Creates a counter-only row with no price data.
    #[must_use]
    pub fn new(card_id: Uuid, metric_date: NaiveDate) -> Self {
        Self {
            card_id,
            metric_date,
            views: 0,
            unique_users: 0,
            deck_inclusions: 0,
            price_avg: None,
            price_change: None,
        }
    }
}

/// Daily counters for one deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckDailyMetric {
    /// Deck id.
    pub deck_id: Uuid,
    /// UTC day the counters cover.
    pub metric_date: NaiveDate,
    /// `deck_viewed` count.
    pub views: i64,
    /// Distinct non-null users across all deck-relevant events.
    pub unique_users: i64,
    /// `deck_imported` count.
    pub imports: i64,
    /// `export_completed` count.
    pub exports: i64,
    /// `bridge_initiated` count.
    pub bridge_requests: i64,
    /// Mean win rate sampled from `deck_viewed` contexts, in `[0, 1]`.
    pub win_rate: Option<f64>,
}

impl DeckDailyMetric {
    /// Creates an all-zero row.
    #[must_use]
    pub fn new(deck_id: Uuid, metric_date: NaiveDate) -> Self {
        Self {
            deck_id,
            metric_date,
            views: 0,
            unique_users: 0,
            imports: 0,
            exports: 0,
            bridge_requests: 0,
            win_rate: None,
        }
    }
}

/// Row counts written by one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSummary {
    /// Card rows created or replaced.
    pub card_metrics_updated: usize,
    /// Deck rows created or replaced.
    pub deck_metrics_updated: usize,
}
