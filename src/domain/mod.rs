//! Domain layer: pure types shared by the jobs, the resolver and storage.
//!
//! Nothing in here performs I/O. Events, metrics, snapshots and job runs
//! mirror persisted rows; seeds are the ephemeral resolver output.

pub mod catalog;
pub mod document;
pub mod event;
pub mod job_run;
pub mod metric;
pub mod scope;
pub mod seed;
pub mod snapshot;

pub use catalog::{Card, CardSearch, Deck, ModelRow};
pub use document::Document;
pub use event::{DayWindow, EventType, RawEvent};
pub use job_run::{JobRun, JobStatus, JobType};
pub use metric::{AggregationSummary, CardDailyMetric, DeckDailyMetric};
pub use scope::{Period, Scope};
pub use seed::{CardSummary, DeckSummary, RecommendationSeed, SeedEntity, SeedSource};
pub use snapshot::{RefreshSummary, TrendingSnapshot};
