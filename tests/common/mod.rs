//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use uuid::Uuid;

use trend_engine::domain::{Card, DayWindow, Deck, EventType, ModelRow, RawEvent};
use trend_engine::persistence::Stores;
use trend_engine::persistence::memory::InMemoryStore;
use trend_engine::service::RecommendationResolver;

/// Tier timeout used by resolver fixtures.
pub const TIER_TIMEOUT: Duration = Duration::from_millis(500);

/// The fixed metric day used across scenarios.
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 2).unwrap_or_default()
}

/// The UTC window for [`day`].
pub fn window() -> DayWindow {
    DayWindow::for_date(day())
}

/// A timestamp `hours` into [`window`].
pub fn at(hours: i64) -> DateTime<Utc> {
    window().start + ChronoDuration::hours(hours)
}

/// An event on `subject` at hour 1 of the window.
pub fn event(kind: EventType, subject: Uuid, user: Option<&str>) -> RawEvent {
    let e = RawEvent::new(kind, Some(subject.to_string()), at(1));
    match user {
        Some(u) => e.by_user(u),
        None => e,
    }
}

/// A catalog card legal in every format in `legal_in`.
pub fn card(name: &str, type_line: &str, colors: &[&str], legal_in: &[&str]) -> Card {
    Card {
        id: Uuid::new_v4(),
        name: name.to_string(),
        type_line: type_line.to_string(),
        color_identity: colors.iter().map(|c| (*c).to_string()).collect(),
        legalities: legal_in
            .iter()
            .map(|f| ((*f).to_string(), "legal".to_string()))
            .collect::<BTreeMap<_, _>>(),
        image_uri: None,
    }
}

/// A catalog deck holding `cards`.
pub fn deck(name: &str, format: Option<&str>, colors: &[&str], cards: &[&Card]) -> Deck {
    Deck {
        id: Uuid::new_v4(),
        name: name.to_string(),
        format: format.map(str::to_string),
        color_identity: colors.iter().map(|c| (*c).to_string()).collect(),
        card_ids: cards.iter().map(|c| c.id).collect(),
    }
}

/// A model row from `subject` to `target`.
pub fn model_row(subject: Uuid, target: Uuid, score: f64) -> ModelRow {
    ModelRow {
        subject_id: subject,
        target_id: target,
        score,
        rationale: None,
        components: Default::default(),
    }
}

/// An empty in-memory store and its store bundle.
pub fn memory_stores() -> (Arc<InMemoryStore>, Stores) {
    let store = Arc::new(InMemoryStore::new());
    let stores = Stores::shared(&store);
    (store, stores)
}

/// A resolver over `stores` with the built-in fallback catalogue.
pub fn resolver(stores: &Stores) -> RecommendationResolver {
    RecommendationResolver::new(stores, TIER_TIMEOUT)
}
