//! Recommendation seeds returned by the resolver.
//!
//! Seeds are built fresh per request and never persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Card, Deck, Document, Scope};

/// Which cascade tier produced a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Global card trending list.
    TrendingCard,
    /// Global deck trending list.
    TrendingDeck,
    /// Card similar to the requested card.
    SimilarCard,
    /// Card that would upgrade the requested deck.
    DeckUpgrade,
    /// Hand-authored static content.
    Fallback,
}

impl SeedSource {
    /// Returns the wire tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TrendingCard => "trending_card",
            Self::TrendingDeck => "trending_deck",
            Self::SimilarCard => "similar_card",
            Self::DeckUpgrade => "deck_upgrade",
            Self::Fallback => "fallback",
        }
    }

    /// Label a request asks for: subject-anchored requests want similar cards
    /// or deck upgrades, open requests want the scope's trending list.
    #[must_use]
    pub const fn requested(scope: Scope, has_subject: bool) -> Self {
        match (scope, has_subject) {
            (Scope::Card, true) => Self::SimilarCard,
            (Scope::Deck, true) => Self::DeckUpgrade,
            (Scope::Card, false) => Self::TrendingCard,
            (Scope::Deck, false) => Self::TrendingDeck,
        }
    }
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display snapshot of a card target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    /// Card id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Full type line.
    pub type_line: String,
    /// Color identity symbols.
    pub color_identity: Vec<String>,
    /// Card image, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

impl From<&Card> for CardSummary {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            name: card.name.clone(),
            type_line: card.type_line.clone(),
            color_identity: card.color_identity.clone(),
            image_uri: card.image_uri.clone(),
        }
    }
}

/// Display snapshot of a deck target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckSummary {
    /// Deck id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Declared format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Aggregate color identity.
    pub color_identity: Vec<String>,
    /// Number of cards in the list.
    pub card_count: usize,
}

impl From<&Deck> for DeckSummary {
    fn from(deck: &Deck) -> Self {
        Self {
            id: deck.id,
            name: deck.name.clone(),
            format: deck.format.clone(),
            color_identity: deck.color_identity.clone(),
            card_count: deck.card_ids.len(),
        }
    }
}

/// Denormalized target snapshot, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedEntity {
    /// Target is a card.
    Card(CardSummary),
    /// Target is a deck.
    Deck(DeckSummary),
}

impl SeedEntity {
    /// Target id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Card(c) => c.id,
            Self::Deck(d) => d.id,
        }
    }

    /// Target display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Card(c) => &c.name,
            Self::Deck(d) => &d.name,
        }
    }
}

impl From<&Card> for SeedEntity {
    fn from(card: &Card) -> Self {
        Self::Card(CardSummary::from(card))
    }
}

impl From<&Deck> for SeedEntity {
    fn from(deck: &Deck) -> Self {
        Self::Deck(DeckSummary::from(deck))
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSeed {
    /// Seed id, `"{source}:{target_id}"`.
    pub id: String,
    /// Scope of the request that produced the seed.
    pub scope: Scope,
    /// Display title (the target's name).
    pub title: String,
    /// Human-readable provenance.
    pub reason: String,
    /// Recommended card or deck id.
    pub target_id: Uuid,
    /// Producing tier.
    pub source: SeedSource,
    /// 1-based position, contiguous across the whole list.
    pub rank: usize,
    /// Trend score, when the target has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_score: Option<f64>,
    /// Diagnostic sub-scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Document>,
    /// Display snapshot of the target.
    pub entity: SeedEntity,
    /// When the resolver built the seed.
    pub generated_at: DateTime<Utc>,
    /// `true` for static fallback content.
    pub fallback: bool,
}

impl RecommendationSeed {
    /// Builds an unranked seed for `entity`. Rank is assigned when the seed
    /// is appended to a result list.
    #[must_use]
    pub fn new(
        scope: Scope,
        source: SeedSource,
        entity: SeedEntity,
        reason: String,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let target_id = entity.id();
        Self {
            id: format!("{source}:{target_id}"),
            scope,
            title: entity.name().to_string(),
            reason,
            target_id,
            source,
            rank: 0,
            trend_score: None,
            metrics: None,
            entity,
            generated_at,
            fallback: matches!(source, SeedSource::Fallback),
        }
    }

    /// Builder-style trend score.
    #[must_use]
    pub fn with_trend_score(mut self, score: Option<f64>) -> Self {
        self.trend_score = score;
        self
    }

    /// Builder-style diagnostic map. Empty maps are dropped.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Document) -> Self {
        self.metrics = (!metrics.is_empty()).then_some(metrics);
        self
    }
}
