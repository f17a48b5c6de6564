//! # trend-engine
//!
//! Daily trend scoring and recommendation resolution for card and deck
//! activity.
//!
//! Two batch jobs turn raw telemetry into trending snapshots: the
//! [`service::MetricAggregator`] rolls one UTC day of events into per-subject
//! daily metrics, and the [`service::TrendScorer`] compresses those metrics
//! into a weighted score per subject. The [`service::RecommendationResolver`]
//! answers recommendation requests by cascading through precomputed model
//! rows, heuristic catalog search, the trending list and a static fallback.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, CLI, scheduler)
//!     │
//!     ├── REST Handlers (api/)          run-job subcommand (main.rs)
//!     │
//!     ├── RecommendationResolver        JobRunner ── JobRunTracker
//!     │                                     ├── MetricAggregator
//!     │                                     └── TrendScorer
//!     │
//!     ├── Store traits (persistence/)
//!     │
//!     └── PostgreSQL | in-memory tables
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
