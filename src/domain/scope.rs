//! Scope and period discriminators shared by metrics, snapshots and seeds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Whether a record or recommendation concerns a card or a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// A single card.
    Card,
    /// A deck list.
    Deck,
}

impl Scope {
    /// Returns the wire/storage string for this scope.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Deck => "deck",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" | "cards" => Ok(Self::Card),
            "deck" | "decks" => Ok(Self::Deck),
            other => Err(EngineError::UnsupportedScope(other.to_string())),
        }
    }
}

/// Aggregation period of a trending snapshot.
///
/// Only daily snapshots are produced by the scorer today; the period is kept
/// as an explicit key so snapshot rows stay unique on `(scope, subject, period)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// One UTC day.
    #[default]
    Daily,
}

impl Period {
    /// Returns the wire/storage string for this period.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            other => Err(EngineError::UnsupportedPeriod(other.to_string())),
        }
    }
}
