//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreBackend;
use crate::persistence::Stores;
use crate::service::{JobRunner, RecommendationResolver};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Recommendation cascade and trending list.
    pub resolver: Arc<RecommendationResolver>,
    /// Job trigger.
    pub jobs: Arc<JobRunner>,
    /// Store handles for read-only observability endpoints.
    pub stores: Stores,
    /// Backend the stores run on, reported by `/health`.
    pub store_backend: StoreBackend,
}

impl AppState {
    /// Wires the resolver and job runner to `stores`.
    #[must_use]
    pub fn new(stores: Stores, store_backend: StoreBackend, tier_timeout: Duration) -> Self {
        let resolver = Arc::new(RecommendationResolver::new(&stores, tier_timeout));
        let jobs = Arc::new(JobRunner::new(&stores, Arc::clone(&resolver)));
        Self {
            resolver,
            jobs,
            stores,
            store_backend,
        }
    }
}
