//! Read-only catalog reference data and precomputed model rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Document, Period};

/// Legality status that admits a card into a format.
pub const LEGAL: &str = "legal";

/// A catalog card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Card id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Full type line, e.g. `"Legendary Creature — Elf Druid"`.
    pub type_line: String,
    /// Color identity symbols (`W`, `U`, `B`, `R`, `G`). Empty for colorless.
    pub color_identity: Vec<String>,
    /// Per-format legality status keyed by lower-case format name.
    pub legalities: BTreeMap<String, String>,
    /// Card image, when known.
    pub image_uri: Option<String>,
}

impl Card {
    /// Returns `true` only when the legality map says exactly `"legal"` for
    /// `format`. A missing entry is not legal.
    #[must_use]
    pub fn is_legal_in(&self, format: &str) -> bool {
        self.legalities.get(format).is_some_and(|s| s == LEGAL)
    }

    /// Primary type token of the type line.
    ///
    /// Takes the text before the first type-line separator and returns its
    /// last word, so `"Legendary Artifact Creature — Golem"` yields
    /// `"Creature"`.
    #[must_use]
    pub fn primary_type(&self) -> Option<&str> {
        primary_type_token(&self.type_line)
    }

    /// Color identity as a set.
    #[must_use]
    pub fn colors(&self) -> BTreeSet<&str> {
        self.color_identity.iter().map(String::as_str).collect()
    }
}

/// Parses the primary type token from a type line. See [`Card::primary_type`].
#[must_use]
pub fn primary_type_token(type_line: &str) -> Option<&str> {
    let head = type_line
        .split('—')
        .next()
        .and_then(|s| s.split(" - ").next())
        .unwrap_or(type_line);
    head.split_whitespace().last()
}

/// A catalog deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    /// Deck id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Lower-case format the deck is built for, when declared.
    pub format: Option<String>,
    /// Aggregate color identity across the deck.
    pub color_identity: Vec<String>,
    /// Cards currently in the deck (main and side boards).
    pub card_ids: Vec<Uuid>,
}

impl Deck {
    /// Returns `true` when the deck declares `format`.
    #[must_use]
    pub fn is_in_format(&self, format: &str) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case(format))
    }
}

/// Attribute filter for heuristic card search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardSearch {
    /// Candidates must share at least one of these colors. An empty list
    /// matches colorless candidates only.
    pub colors: Vec<String>,
    /// When set, the candidate's type line must contain this token
    /// (case-insensitive).
    pub type_token: Option<String>,
    /// When set, the candidate must be legal in this format.
    pub format: Option<String>,
    /// Ids that must never be returned.
    pub exclude: Vec<Uuid>,
    /// When set, hits are ordered by their card trend score in this period,
    /// highest first, before `limit` is applied. Unscored hits follow in
    /// name order.
    pub rank_period: Option<Period>,
    /// Maximum rows to return.
    pub limit: usize,
}

impl CardSearch {
    /// Returns `true` when `card` satisfies every predicate except `limit`.
    #[must_use]
    pub fn matches(&self, card: &Card) -> bool {
        if self.exclude.contains(&card.id) {
            return false;
        }
        let colors_match = if self.colors.is_empty() {
            card.color_identity.is_empty()
        } else {
            card.color_identity.iter().any(|c| self.colors.contains(c))
        };
        if !colors_match {
            return false;
        }
        if let Some(token) = &self.type_token
            && !card
                .type_line
                .to_ascii_lowercase()
                .contains(&token.to_ascii_lowercase())
        {
            return false;
        }
        self.format.as_deref().is_none_or(|f| card.is_legal_in(f))
    }
}

/// One precomputed similarity edge or deck-upgrade candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRow {
    /// The card or deck the row was computed for.
    pub subject_id: Uuid,
    /// Recommended card.
    pub target_id: Uuid,
    /// Model score; higher is better.
    pub score: f64,
    /// Optional free-text explanation.
    pub rationale: Option<String>,
    /// Optional model sub-scores.
    #[serde(default)]
    pub components: Document,
}
