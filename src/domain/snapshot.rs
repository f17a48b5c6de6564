//! Trending snapshots produced by the scorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Document, Period, Scope};

/// Composite trend score for one `(scope, subject, period)`.
///
/// Unique on that triple. A scorer run overwrites score, components and
/// `calculated_at` for every subject present in its metric set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSnapshot {
    /// Card or deck.
    pub scope: Scope,
    /// Card or deck id.
    pub subject_id: Uuid,
    /// Snapshot period.
    pub period: Period,
    /// Weighted score, rounded to 4 fraction digits.
    pub trend_score: f64,
    /// Named sub-scores that produced `trend_score`.
    pub components: Document,
    /// When the scorer computed this row.
    pub calculated_at: DateTime<Utc>,
}

/// Row counts written by one scorer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    /// Card snapshots written.
    pub card_snapshots: usize,
    /// Deck snapshots written.
    pub deck_snapshots: usize,
}

/// Human-readable provenance for a trending entry, derived from its
/// components.
#[must_use]
pub fn trending_reason(snapshot: &TrendingSnapshot) -> String {
    let c = &snapshot.components;
    let count = |key: &str| c.get_i64(key).unwrap_or(0);
    match snapshot.scope {
        Scope::Card => {
            let growth = c.get_f64("price_growth").unwrap_or(0.0);
            if growth.abs() >= 0.05 {
                format!(
                    "Trending {}: {} views, {} deck inclusions, price {:+.0}%",
                    snapshot.period,
                    count("views"),
                    count("deck_inclusions"),
                    growth * 100.0
                )
            } else {
                format!(
                    "Trending {}: {} views, {} deck inclusions",
                    snapshot.period,
                    count("views"),
                    count("deck_inclusions")
                )
            }
        }
        Scope::Deck => format!(
            "Trending {}: {} views, {} imports, {} exports",
            snapshot.period,
            count("views"),
            count("imports"),
            count("exports")
        ),
    }
}
