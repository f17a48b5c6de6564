//! Resolve endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{RecommendationListResponse, RecommendationQuery};
use crate::app_state::AppState;
use crate::error::{EngineError, ErrorResponse};

/// `GET /recommendations` — Resolve a ranked recommendation list.
///
/// # Errors
///
/// Returns a 400 [`EngineError`] for invalid query parameters. Tier
/// failures degrade to fallback content instead of failing.
#[utoipa::path(
    get,
    path = "/api/v1/recommendations",
    tag = "Recommendations",
    summary = "Resolve recommendations",
    description = "Runs the model, heuristic and trending tiers in order, deduplicating targets, and falls back to static content when none of them produce data. `meta.resolver` names the contributing tiers.",
    params(RecommendationQuery),
    responses(
        (status = 200, description = "Ranked seeds", body = RecommendationListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "No content available", body = ErrorResponse),
    )
)]
pub async fn resolve_recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let request = query.into_request()?;
    let response = state.resolver.resolve(&request).await?;
    tracing::debug!(
        scope = %request.scope,
        resolver = %response.meta.resolver,
        count = response.meta.count,
        "recommendations resolved"
    );
    Ok(Json(RecommendationListResponse::from(response)))
}

/// Recommendation routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/recommendations", get(resolve_recommendations))
}
