//! Hand-authored seeds served when no live tier produced anything.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    CardSummary, DeckSummary, RecommendationSeed, Scope, SeedEntity, SeedSource,
};

struct StaticCard {
    id: Uuid,
    name: &'static str,
    type_line: &'static str,
    colors: &'static [&'static str],
    reason: &'static str,
}

struct StaticDeck {
    id: Uuid,
    name: &'static str,
    format: &'static str,
    colors: &'static [&'static str],
    card_count: usize,
    reason: &'static str,
}

const STAPLE_CARDS: [StaticCard; 8] = [
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0001),
        name: "Sol Ring",
        type_line: "Artifact",
        colors: &[],
        reason: "Format staple: fast mana that fits any colors",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0002),
        name: "Lightning Bolt",
        type_line: "Instant",
        colors: &["R"],
        reason: "Format staple: efficient removal and reach",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0003),
        name: "Counterspell",
        type_line: "Instant",
        colors: &["U"],
        reason: "Format staple: clean answer to any spell",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0004),
        name: "Swords to Plowshares",
        type_line: "Instant",
        colors: &["W"],
        reason: "Format staple: one-mana creature removal",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0005),
        name: "Llanowar Elves",
        type_line: "Creature — Elf Druid",
        colors: &["G"],
        reason: "Format staple: turn-one ramp",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0006),
        name: "Thoughtseize",
        type_line: "Sorcery",
        colors: &["B"],
        reason: "Format staple: disruption and information",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0007),
        name: "Command Tower",
        type_line: "Land",
        colors: &[],
        reason: "Format staple: mana fixing for multicolor decks",
    },
    StaticCard {
        id: Uuid::from_u128(0x5eed_0001_0000_4000_8000_0000_0000_0008),
        name: "Arcane Signet",
        type_line: "Artifact",
        colors: &[],
        reason: "Format staple: colorless ramp",
    },
];

const STARTER_DECKS: [StaticDeck; 6] = [
    StaticDeck {
        id: Uuid::from_u128(0x5eed_0002_0000_4000_8000_0000_0000_0001),
        name: "Mono-Red Aggro",
        format: "modern",
        colors: &["R"],
        card_count: 60,
        reason: "Starter archetype: fast and forgiving",
    },
    StaticDeck {
        id: Uuid::from_u128(0x5eed_0002_0000_4000_8000_0000_0000_0002),
        name: "Azorius Control",
        format: "modern",
        colors: &["W", "U"],
        card_count: 60,
        reason: "Starter archetype: answers and card advantage",
    },
    StaticDeck {
        id: Uuid::from_u128(0x5eed_0002_0000_4000_8000_0000_0000_0003),
        name: "Golgari Midrange",
        format: "pioneer",
        colors: &["B", "G"],
        card_count: 60,
        reason: "Starter archetype: value creatures and removal",
    },
    StaticDeck {
        id: Uuid::from_u128(0x5eed_0002_0000_4000_8000_0000_0000_0004),
        name: "Izzet Prowess",
        format: "pioneer",
        colors: &["U", "R"],
        card_count: 60,
        reason: "Starter archetype: cheap spells and tempo",
    },
    StaticDeck {
        id: Uuid::from_u128(0x5eed_0002_0000_4000_8000_0000_0000_0005),
        name: "Mono-Green Stompy",
        format: "pauper",
        colors: &["G"],
        card_count: 60,
        reason: "Starter archetype: budget-friendly beatdown",
    },
    StaticDeck {
        id: Uuid::from_u128(0x5eed_0002_0000_4000_8000_0000_0000_0006),
        name: "Elf Tribal",
        format: "commander",
        colors: &["G"],
        card_count: 100,
        reason: "Starter archetype: popular casual commander build",
    },
];

fn colors(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| (*s).to_string()).collect()
}

/// Static seed catalogue, one list per scope.
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    cards: Vec<(CardSummary, String)>,
    decks: Vec<(DeckSummary, String)>,
}

impl Default for FallbackCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackCatalog {
    /// The compiled-in staples and starter decks.
    #[must_use]
    pub fn builtin() -> Self {
        let cards = STAPLE_CARDS
            .iter()
            .map(|c| {
                let summary = CardSummary {
                    id: c.id,
                    name: c.name.to_string(),
                    type_line: c.type_line.to_string(),
                    color_identity: colors(c.colors),
                    image_uri: None,
                };
                (summary, c.reason.to_string())
            })
            .collect();
        let decks = STARTER_DECKS
            .iter()
            .map(|d| {
                let summary = DeckSummary {
                    id: d.id,
                    name: d.name.to_string(),
                    format: Some(d.format.to_string()),
                    color_identity: colors(d.colors),
                    card_count: d.card_count,
                };
                (summary, d.reason.to_string())
            })
            .collect();
        Self { cards, decks }
    }

    /// A catalogue with no content, under which an unfilled cascade is an
    /// error.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            cards: Vec::new(),
            decks: Vec::new(),
        }
    }

    /// Number of static seeds for `scope`.
    #[must_use]
    pub fn len(&self, scope: Scope) -> usize {
        match scope {
            Scope::Card => self.cards.len(),
            Scope::Deck => self.decks.len(),
        }
    }

    /// Seeds for `scope` in authored order, at most `limit`, ranked 1..N.
    #[must_use]
    pub fn seeds(
        &self,
        scope: Scope,
        limit: usize,
        generated_at: DateTime<Utc>,
    ) -> Vec<RecommendationSeed> {
        let build = |i: usize, entity: SeedEntity, reason: &String| {
            let mut seed = RecommendationSeed::new(
                scope,
                SeedSource::Fallback,
                entity,
                reason.clone(),
                generated_at,
            );
            seed.rank = i.saturating_add(1);
            seed
        };
        match scope {
            Scope::Card => self
                .cards
                .iter()
                .take(limit)
                .enumerate()
                .map(|(i, (c, r))| build(i, SeedEntity::Card(c.clone()), r))
                .collect(),
            Scope::Deck => self
                .decks
                .iter()
                .take(limit)
                .enumerate()
                .map(|(i, (d, r))| build(i, SeedEntity::Deck(d.clone()), r))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_seeds_are_flagged_and_ranked() {
        let seeds = FallbackCatalog::builtin().seeds(Scope::Card, 5, Utc::now());
        assert_eq!(seeds.len(), 5);
        assert!(seeds.iter().all(|s| s.fallback && s.source == SeedSource::Fallback));
        let ranks: Vec<usize> = seeds.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn static_ids_are_unique_across_scopes() {
        let catalog = FallbackCatalog::builtin();
        let now = Utc::now();
        let ids: HashSet<Uuid> = catalog
            .seeds(Scope::Card, 50, now)
            .into_iter()
            .chain(catalog.seeds(Scope::Deck, 50, now))
            .map(|s| s.target_id)
            .collect();
        assert_eq!(ids.len(), catalog.len(Scope::Card) + catalog.len(Scope::Deck));
    }

    #[test]
    fn empty_catalogue_yields_nothing() {
        assert!(FallbackCatalog::empty().seeds(Scope::Deck, 8, Utc::now()).is_empty());
    }
}
