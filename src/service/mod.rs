//! Service layer: batch jobs and the recommendation read path.
//!
//! [`MetricAggregator`] and [`TrendScorer`] are the two batch jobs, run by
//! [`JobRunner`] under a [`JobRunTracker`]. [`RecommendationResolver`] is
//! the stateless per-request cascade.

pub mod aggregator;
pub mod fallback;
pub mod job_runner;
pub mod job_tracker;
pub mod resolver;
pub mod scorer;

pub use aggregator::MetricAggregator;
pub use fallback::FallbackCatalog;
pub use job_runner::JobRunner;
pub use job_tracker::JobRunTracker;
pub use resolver::{
    RecommendationResolver, ResolveMeta, ResolveRequest, ResolveResponse, TrendingEntry,
};
pub use scorer::TrendScorer;
