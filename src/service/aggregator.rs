//! Metric aggregator: one UTC day of raw events into per-subject daily rows.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    AggregationSummary, CardDailyMetric, DayWindow, DeckDailyMetric, EventType, RawEvent,
};
use crate::error::EngineError;
use crate::persistence::{EventFeed, TrendStore};

/// Context keys carrying a win-rate sample on `deck_viewed` events. Both
/// spellings are accepted.
pub const WIN_RATE_KEYS: [&str; 2] = ["win_rate", "winRate"];

/// Scans one day window and upserts card and deck daily metrics.
#[derive(Debug, Clone)]
pub struct MetricAggregator {
    events: Arc<dyn EventFeed>,
    trends: Arc<dyn TrendStore>,
}

#[derive(Default)]
struct CardAccumulator<'a> {
    views: i64,
    deck_inclusions: i64,
    users: HashSet<&'a str>,
}

#[derive(Default)]
struct DeckAccumulator<'a> {
    views: i64,
    imports: i64,
    exports: i64,
    bridge_requests: i64,
    users: HashSet<&'a str>,
    win_rate_sum: f64,
    win_rate_samples: u32,
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Groups events into card and deck rows for `window`.
///
/// Pure: events outside the window, of unknown types, or with a missing or
/// non-UUID subject are ignored. Rows are ordered by subject id.
#[must_use]
pub fn build_metrics(
    window: &DayWindow,
    events: &[RawEvent],
) -> (Vec<CardDailyMetric>, Vec<DeckDailyMetric>) {
    let mut cards: BTreeMap<Uuid, CardAccumulator<'_>> = BTreeMap::new();
    let mut decks: BTreeMap<Uuid, DeckAccumulator<'_>> = BTreeMap::new();
    let mut discarded = 0_usize;

    for event in events {
        if !window.contains(event.occurred_at) {
            continue;
        }
        let (Some(kind), Some(subject)) = (event.kind(), event.subject_uuid()) else {
            discarded = discarded.saturating_add(1);
            continue;
        };

        if kind.is_card_event() {
            let acc = cards.entry(subject).or_default();
            match kind {
                EventType::CardViewed => {
                    acc.views = acc.views.saturating_add(1);
                    if let Some(user) = event.user() {
                        acc.users.insert(user);
                    }
                }
                EventType::DeckCardAdded => {
                    acc.deck_inclusions = acc.deck_inclusions.saturating_add(1);
                }
                _ => {}
            }
            continue;
        }

        let acc = decks.entry(subject).or_default();
        if let Some(user) = event.user() {
            acc.users.insert(user);
        }
        match kind {
            EventType::DeckViewed => {
                acc.views = acc.views.saturating_add(1);
                // Out-of-range samples (percentages, garbage) count as missing.
                if let Some(rate) = event
                    .context
                    .first_f64(&WIN_RATE_KEYS)
                    .filter(|r| (0.0..=1.0).contains(r))
                {
                    acc.win_rate_sum += rate;
                    acc.win_rate_samples = acc.win_rate_samples.saturating_add(1);
                }
            }
            EventType::DeckImported => acc.imports = acc.imports.saturating_add(1),
            EventType::ExportCompleted => acc.exports = acc.exports.saturating_add(1),
            EventType::BridgeInitiated => {
                acc.bridge_requests = acc.bridge_requests.saturating_add(1);
            }
            _ => {}
        }
    }

    if discarded > 0 {
        tracing::debug!(discarded, "ignored events with unknown type or malformed subject");
    }

    let date = window.metric_date();
    let card_rows = cards
        .into_iter()
        .map(|(card_id, acc)| CardDailyMetric {
            views: acc.views,
            unique_users: count(acc.users.len()),
            deck_inclusions: acc.deck_inclusions,
            ..CardDailyMetric::new(card_id, date)
        })
        .collect();
    let deck_rows = decks
        .into_iter()
        .map(|(deck_id, acc)| DeckDailyMetric {
            views: acc.views,
            unique_users: count(acc.users.len()),
            imports: acc.imports,
            exports: acc.exports,
            bridge_requests: acc.bridge_requests,
            win_rate: (acc.win_rate_samples > 0)
                .then(|| acc.win_rate_sum / f64::from(acc.win_rate_samples)),
            ..DeckDailyMetric::new(deck_id, date)
        })
        .collect();

    (card_rows, deck_rows)
}

impl MetricAggregator {
    /// Creates an aggregator over the given stores.
    #[must_use]
    pub fn new(events: Arc<dyn EventFeed>, trends: Arc<dyn TrendStore>) -> Self {
        Self { events, trends }
    }

    /// Aggregates `window` and upserts the resulting rows in one atomic write.
    ///
    /// Re-running the same window replaces the same rows, so repeated runs
    /// never duplicate or double-count. An empty window writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] when the event read or the
    /// metric write fails.
    pub async fn aggregate(&self, window: &DayWindow) -> Result<AggregationSummary, EngineError> {
        let events = self
            .events
            .events_in_window(window, &EventType::ALL)
            .await?;
        let (cards, decks) = build_metrics(window, &events);

        let summary = AggregationSummary {
            card_metrics_updated: cards.len(),
            deck_metrics_updated: decks.len(),
        };

        if !cards.is_empty() || !decks.is_empty() {
            self.trends.upsert_daily_metrics(&cards, &decks).await?;
        }

        tracing::info!(
            window_start = %window.start,
            events = events.len(),
            card_metrics = summary.card_metrics_updated,
            deck_metrics = summary.deck_metrics_updated,
            "daily metrics aggregated"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Document;
    use chrono::{Duration, NaiveDate};

    fn window() -> DayWindow {
        let Some(date) = NaiveDate::from_ymd_opt(2026, 4, 2) else {
            panic!("valid date");
        };
        DayWindow::for_date(date)
    }

    fn event(kind: EventType, subject: Uuid, user: Option<&str>) -> RawEvent {
        let e = RawEvent::new(
            kind,
            Some(subject.to_string()),
            window().start + Duration::hours(3),
        );
        match user {
            Some(u) => e.by_user(u),
            None => e,
        }
    }

    #[test]
    fn deck_events_merge_into_one_row() {
        let deck = Uuid::new_v4();
        let events = vec![
            event(EventType::DeckViewed, deck, Some("u1"))
                .with_context(Document::new().with("win_rate", 0.5)),
            event(EventType::DeckViewed, deck, Some("u2"))
                .with_context(Document::new().with("winRate", "0.7")),
            event(EventType::DeckViewed, deck, None)
                .with_context(Document::new().with("win_rate", "n/a")),
            event(EventType::DeckImported, deck, Some("u3")),
            event(EventType::ExportCompleted, deck, Some("u1")),
            event(EventType::BridgeInitiated, deck, None),
        ];

        let (cards, decks) = build_metrics(&window(), &events);
        assert!(cards.is_empty());
        assert_eq!(decks.len(), 1);
        let Some(row) = decks.first() else {
            panic!("missing deck row");
        };
        assert_eq!(row.views, 3);
        assert_eq!(row.imports, 1);
        assert_eq!(row.exports, 1);
        assert_eq!(row.bridge_requests, 1);
        assert_eq!(row.unique_users, 3);
        let Some(rate) = row.win_rate else {
            panic!("expected win rate");
        };
        assert!((rate - 0.6).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_win_rates_are_ignored() {
        let deck = Uuid::new_v4();
        let events = vec![
            event(EventType::DeckViewed, deck, None)
                .with_context(Document::new().with("win_rate", 150)),
            event(EventType::DeckViewed, deck, None)
                .with_context(Document::new().with("winRate", -0.2)),
            event(EventType::DeckViewed, deck, None)
                .with_context(Document::new().with("win_rate", 1.0)),
            event(EventType::DeckViewed, deck, None)
                .with_context(Document::new().with("win_rate", 0.0)),
        ];

        let (_, decks) = build_metrics(&window(), &events);
        let Some(row) = decks.first() else {
            panic!("missing deck row");
        };
        assert_eq!(row.views, 4);
        assert_eq!(row.win_rate, Some(0.5));

        let only_bad = vec![
            event(EventType::DeckViewed, deck, None)
                .with_context(Document::new().with("win_rate", 62.5)),
        ];
        let (_, decks) = build_metrics(&window(), &only_bad);
        assert_eq!(decks.first().map(|d| d.win_rate), Some(None));
    }

    #[test]
    fn win_rate_is_none_without_samples() {
        let deck = Uuid::new_v4();
        let (_, decks) = build_metrics(&window(), &[event(EventType::DeckImported, deck, None)]);
        assert_eq!(decks.first().and_then(|d| d.win_rate), None);
    }

    #[test]
    fn card_unique_users_only_count_views() {
        let card = Uuid::new_v4();
        let events = vec![
            event(EventType::CardViewed, card, Some("u1")),
            event(EventType::DeckCardAdded, card, Some("u9")),
        ];
        let (cards, _) = build_metrics(&window(), &events);
        let Some(row) = cards.first() else {
            panic!("missing card row");
        };
        assert_eq!(row.unique_users, 1);
        assert_eq!(row.deck_inclusions, 1);
    }

    #[test]
    fn out_of_window_and_malformed_events_are_ignored() {
        let card = Uuid::new_v4();
        let mut late = event(EventType::CardViewed, card, None);
        late.occurred_at = window().end;
        let mut bad = event(EventType::CardViewed, card, None);
        bad.subject_id = Some("card-123".into());
        let mut unknown = event(EventType::CardViewed, card, None);
        unknown.event_type = "page_viewed".into();

        let (cards, decks) = build_metrics(&window(), &[late, bad, unknown]);
        assert!(cards.is_empty());
        assert!(decks.is_empty());
    }
}
