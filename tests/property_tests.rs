//! Property-based tests for the aggregation, scoring and resolver invariants.
//!
//! These tests use `proptest` to generate event streams, metric rows and
//! catalogues, and check properties that must hold for every input rather
//! than for a handful of fixtures.
//!
//! # Prerequisites
//!
//! - No database or network access required. Async properties run against
//!   [`InMemoryStore`] under `tokio_test::block_on`.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test property_tests
//!
//! # More cases:
//! PROPTEST_CASES=2000 cargo test --test property_tests
//! ```
//!
//! # Testing strategy
//!
//! - **Aggregation**: grouping is independent of event order, view totals
//!   match the in-window view events, and re-running a window leaves the
//!   table unchanged.
//! - **Scoring**: scores are deterministic and never decrease when an
//!   engagement count grows.
//! - **Resolver**: whatever the catalogue, model rows and snapshots look
//!   like, the output has unique targets, ranks `1..=N`, at most `limit`
//!   seeds, never the subject itself, and only format-legal cards when a
//!   format is requested.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use common::{card, memory_stores, model_row, resolver, window};
use trend_engine::domain::{
    Card, DeckDailyMetric, Document, EventType, Period, RawEvent, Scope, TrendingSnapshot,
};
use trend_engine::persistence::TrendStore;
use trend_engine::service::aggregator::build_metrics;
use trend_engine::service::scorer::score_deck;
use trend_engine::service::{MetricAggregator, ResolveRequest};

const KINDS: [EventType; 6] = [
    EventType::CardViewed,
    EventType::DeckCardAdded,
    EventType::DeckViewed,
    EventType::DeckImported,
    EventType::ExportCompleted,
    EventType::BridgeInitiated,
];

const COLORS: [&str; 5] = ["W", "U", "B", "R", "G"];
const TYPES: [&str; 4] = ["Creature — Elf", "Instant", "Sorcery", "Artifact"];

/// `(kind, subject, user, minute offset)` tuples. Offsets past one day fall
/// outside the window.
fn events_strategy() -> impl Strategy<Value = Vec<(usize, usize, usize, i64)>> {
    prop::collection::vec((0..KINDS.len(), 0..4_usize, 0..5_usize, -60..1_600_i64), 0..40)
}

fn materialize(subjects: &[Uuid], raw: &[(usize, usize, usize, i64)]) -> Vec<RawEvent> {
    let start = window().start;
    raw.iter()
        .map(|&(kind, subject, user, minute)| {
            let e = RawEvent::new(
                KINDS[kind],
                Some(subjects[subject].to_string()),
                start + ChronoDuration::minutes(minute),
            );
            if user == 0 {
                e
            } else {
                e.by_user(&format!("user-{user}"))
            }
        })
        .collect()
}

fn catalogue(shapes: &[(u8, usize)]) -> Vec<Card> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, &(mask, type_idx))| {
            let colors: Vec<&str> = COLORS
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, c)| *c)
                .collect();
            // Every third card is legacy-only so format filters have work to do.
            let legal_in: &[&str] = if i % 3 == 0 { &["legacy"] } else { &["modern", "legacy"] };
            card(&format!("Card {i:02}"), TYPES[type_idx], &colors, legal_in)
        })
        .collect()
}

// == Aggregation ================================================================

proptest! {
    /// Grouping depends only on the multiset of events, not their order.
    #[test]
    fn prop_build_metrics_ignores_event_order(raw in events_strategy()) {
        let subjects: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let events = materialize(&subjects, &raw);
        let mut reversed = events.clone();
        reversed.reverse();

        prop_assert_eq!(build_metrics(&window(), &events), build_metrics(&window(), &reversed));
    }

    /// Card view totals equal the number of in-window view events.
    #[test]
    fn prop_view_totals_match_events(raw in events_strategy()) {
        let subjects: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let events = materialize(&subjects, &raw);
        let w = window();
        let expected = events
            .iter()
            .filter(|e| w.contains(e.occurred_at) && e.kind() == Some(EventType::CardViewed))
            .count();

        let (cards, _) = build_metrics(&w, &events);
        let total: i64 = cards.iter().map(|c| c.views).sum();
        prop_assert_eq!(usize::try_from(total).unwrap_or(usize::MAX), expected);
        prop_assert!(cards.iter().all(|c| c.unique_users <= c.views + c.deck_inclusions));
    }

    /// Aggregating the same window twice leaves identical rows.
    #[test]
    fn prop_aggregation_is_idempotent(raw in events_strategy()) {
        tokio_test::block_on(async {
            let (store, stores) = memory_stores();
            let subjects: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            store.insert_events(materialize(&subjects, &raw)).await;
            let aggregator = MetricAggregator::new(Arc::clone(&stores.events), Arc::clone(&stores.trends));

            let first = aggregator.aggregate(&window()).await.ok();
            let cards = store.all_card_metrics().await;
            let decks = store.all_deck_metrics().await;
            let second = aggregator.aggregate(&window()).await.ok();

            assert!(first.is_some());
            assert_eq!(first, second);
            assert_eq!(store.all_card_metrics().await, cards);
            assert_eq!(store.all_deck_metrics().await, decks);
        });
    }
}

// == Scoring ====================================================================

proptest! {
    /// Deck scores are deterministic and monotone in every count.
    #[test]
    fn prop_deck_score_is_monotone(
        views in 0..10_000_i64,
        imports in 0..1_000_i64,
        exports in 0..1_000_i64,
        bridges in 0..1_000_i64,
        win_rate in prop::option::of(0.0..1.0_f64),
        field in 0..4_usize,
    ) {
        let base = DeckDailyMetric {
            views,
            imports,
            exports,
            bridge_requests: bridges,
            win_rate,
            ..DeckDailyMetric::new(Uuid::nil(), window().metric_date())
        };
        let mut bumped = base.clone();
        match field {
            0 => bumped.views += 1,
            1 => bumped.imports += 1,
            2 => bumped.exports += 1,
            _ => bumped.bridge_requests += 1,
        }

        let (Ok((a, _)), Ok((b, _)), Ok((c, _))) =
            (score_deck(&base), score_deck(&base), score_deck(&bumped))
        else {
            panic!("finite inputs must score");
        };
        prop_assert_eq!(a, b);
        prop_assert!(c >= a);
        prop_assert!(a >= 0.0);
    }
}

// == Resolver ===================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The cascade output is a deduplicated, contiguously ranked list that
    /// never contains the subject.
    #[test]
    fn prop_resolver_output_is_well_formed(
        shapes in prop::collection::vec((1_u8..32, 0..TYPES.len()), 2..24),
        edges in prop::collection::vec((0..24_usize, 0.0..1.0_f64), 0..12),
        trending in prop::collection::vec((0..24_usize, 0.0..100.0_f64), 0..12),
        subject_idx in 0..24_usize,
        limit in 1..20_usize,
        with_format in any::<bool>(),
    ) {
        tokio_test::block_on(async {
            let (store, stores) = memory_stores();
            let cards = catalogue(&shapes);
            let pick = |i: usize| cards[i % cards.len()].id;
            let subject = pick(subject_idx);

            store.insert_cards(cards.clone()).await;
            // Edges may point back at the subject or repeat a target.
            store
                .insert_similar_cards(edges.iter().map(|&(t, s)| model_row(subject, pick(t), s)))
                .await;
            let snapshots: Vec<TrendingSnapshot> = trending
                .iter()
                .map(|&(t, score)| TrendingSnapshot {
                    scope: Scope::Card,
                    subject_id: pick(t),
                    period: Period::Daily,
                    trend_score: score,
                    components: Document::new(),
                    calculated_at: Utc::now(),
                })
                .collect();
            assert!(store.upsert_snapshots(&snapshots).await.is_ok());

            let mut request = ResolveRequest::new(Scope::Card)
                .with_subject(subject)
                .with_limit(limit);
            if with_format {
                request = request.with_format("Modern");
            }
            let Ok(response) = resolver(&stores).resolve(&request).await else {
                panic!("resolve failed");
            };

            let ids: Vec<Uuid> = response.seeds.iter().map(|s| s.target_id).collect();
            let unique: HashSet<Uuid> = ids.iter().copied().collect();
            assert_eq!(unique.len(), ids.len());
            assert!(!unique.contains(&subject));
            assert!(!ids.is_empty() && ids.len() <= limit);
            let ranks: Vec<usize> = response.seeds.iter().map(|s| s.rank).collect();
            assert_eq!(ranks, (1..=ids.len()).collect::<Vec<_>>());
            assert_eq!(response.meta.count, ids.len());
            if with_format {
                assert!(
                    response
                        .seeds
                        .iter()
                        .filter(|s| !s.fallback)
                        .all(|s| cards.iter().any(|c| c.id == s.target_id && c.is_legal_in("modern")))
                );
            }
        });
    }
}
