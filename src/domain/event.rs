//! Raw behavioral events and the UTC day window an aggregation run covers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// Event types the aggregator consumes.
///
/// The first two feed card metrics, the remaining four feed deck metrics.
/// The groups are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A card detail page was viewed.
    CardViewed,
    /// A card was added to a deck.
    DeckCardAdded,
    /// A deck page was viewed.
    DeckViewed,
    /// A deck list was imported.
    DeckImported,
    /// A deck export finished.
    ExportCompleted,
    /// A deck was sent through the bridge to an external client.
    BridgeInitiated,
}

impl EventType {
    /// Card-relevant event types.
    pub const CARD: [Self; 2] = [Self::CardViewed, Self::DeckCardAdded];

    /// Deck-relevant event types.
    pub const DECK: [Self; 4] = [
        Self::DeckViewed,
        Self::DeckImported,
        Self::ExportCompleted,
        Self::BridgeInitiated,
    ];

    /// Every event type the aggregator reads.
    pub const ALL: [Self; 6] = [
        Self::CardViewed,
        Self::DeckCardAdded,
        Self::DeckViewed,
        Self::DeckImported,
        Self::ExportCompleted,
        Self::BridgeInitiated,
    ];

    /// Returns the stored event-type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CardViewed => "card_viewed",
            Self::DeckCardAdded => "deck_card_added",
            Self::DeckViewed => "deck_viewed",
            Self::DeckImported => "deck_imported",
            Self::ExportCompleted => "export_completed",
            Self::BridgeInitiated => "bridge_initiated",
        }
    }

    /// Returns `true` for card-relevant types.
    #[must_use]
    pub const fn is_card_event(&self) -> bool {
        matches!(self, Self::CardViewed | Self::DeckCardAdded)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

/// A persisted telemetry event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Stored event type string. Unknown types are carried but ignored.
    pub event_type: String,
    /// Card or deck id. May be absent or malformed.
    pub subject_id: Option<String>,
    /// Acting user, when known.
    pub user_id: Option<String>,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
    /// Event-specific payload.
    #[serde(default)]
    pub context: Document,
}

impl RawEvent {
    /// Creates an event with an empty context.
    #[must_use]
    pub fn new(event_type: EventType, subject_id: Option<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.as_str().to_string(),
            subject_id,
            user_id: None,
            occurred_at,
            context: Document::new(),
        }
    }

    /// Builder-style user id.
    #[must_use]
    pub fn by_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Builder-style context.
    #[must_use]
    pub fn with_context(mut self, context: Document) -> Self {
        self.context = context;
        self
    }

    /// Parsed event type, if it is one the engine understands.
    #[must_use]
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// Subject id parsed as a UUID. Missing or non-UUID-shaped ids yield `None`.
    #[must_use]
    pub fn subject_uuid(&self) -> Option<Uuid> {
        self.subject_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    /// User id with blank values treated as absent.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Half-open UTC day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayWindow {
    /// Midnight UTC of the target day (inclusive).
    pub start: DateTime<Utc>,
    /// Midnight UTC of the following day (exclusive).
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Window covering the given UTC calendar day.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Window covering the UTC day that contains `at`.
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self::for_date(at.date_naive())
    }

    /// Metric date keyed by this window (the start's calendar date).
    #[must_use]
    pub fn metric_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Returns `true` when `at` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_truncates_to_midnight_utc() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 17, 45, 3).single();
        let Some(at) = at else {
            panic!("valid timestamp");
        };
        let window = DayWindow::containing(at);
        assert_eq!(window.start.to_rfc3339(), "2026-03-14T00:00:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2026-03-15T00:00:00+00:00");
        assert!(window.contains(at));
        assert!(!window.contains(window.end));
        assert!(window.contains(window.start));
    }

    #[test]
    fn event_type_groups_are_disjoint() {
        for t in EventType::CARD {
            assert!(!EventType::DECK.contains(&t));
            assert!(t.is_card_event());
        }
        for t in EventType::DECK {
            assert!(!t.is_card_event());
        }
    }

    #[test]
    fn malformed_subject_is_none() {
        let now = Utc::now();
        let bad = RawEvent::new(EventType::CardViewed, Some("not-a-uuid".into()), now);
        let missing = RawEvent::new(EventType::CardViewed, None, now);
        let good = RawEvent::new(
            EventType::CardViewed,
            Some(Uuid::new_v4().to_string()),
            now,
        );
        assert!(bad.subject_uuid().is_none());
        assert!(missing.subject_uuid().is_none());
        assert!(good.subject_uuid().is_some());
    }

    #[test]
    fn event_type_string_round_trip() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().ok(), Some(t));
        }
        assert!("page_viewed".parse::<EventType>().is_err());
    }
}
