//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints except `/health` are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "trend-engine",
        description = "Daily trend scoring and recommendation resolution."
    ),
    paths(
        handlers::system::health_handler,
        handlers::recommendations::resolve_recommendations,
        handlers::trending::list_trending,
        handlers::jobs::trigger_job,
        handlers::jobs::list_job_runs,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        handlers::system::HealthResponse,
        dto::RecommendationListResponse,
        dto::RecommendationMeta,
        dto::TrendingListResponse,
        dto::TrendingEntryDto,
        dto::TriggerJobRequest,
        dto::JobRunDto,
        dto::JobRunListResponse,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Recommendations", description = "Recommendation cascade"),
        (name = "Trending", description = "Trending snapshots"),
        (name = "Jobs", description = "Batch job trigger and history"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
