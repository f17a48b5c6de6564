//! Trending list endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    TrendingEntryDto, TrendingListResponse, TrendingQuery, parse_limit, parse_period, parse_scope,
};
use crate::app_state::AppState;
use crate::error::{EngineError, ErrorResponse};
use crate::service::resolver::{DEFAULT_LIMIT, MAX_LIMIT, normalize_format};

/// `GET /trending` — Current trending snapshots for a scope.
///
/// # Errors
///
/// Returns a 400 [`EngineError`] for invalid query parameters, or a 500
/// when the snapshot or catalog store fails.
#[utoipa::path(
    get,
    path = "/api/v1/trending",
    tag = "Trending",
    summary = "List trending subjects",
    description = "Returns the highest-scoring snapshots for the scope and period, joined with their catalog entries. This is the list the resolver's trending tier consumes.",
    params(TrendingQuery),
    responses(
        (status = 200, description = "Trending list", body = TrendingListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn list_trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let scope = parse_scope(query.scope.as_deref())?;
    let period = parse_period(query.period.as_deref())?;
    let format = normalize_format(query.format.as_deref());
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIMIT, MAX_LIMIT)?;

    let entries = state
        .resolver
        .trending(scope, period, format.as_deref(), limit)
        .await?;
    let data: Vec<TrendingEntryDto> = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| TrendingEntryDto::new(i.saturating_add(1), entry))
        .collect();

    Ok(Json(TrendingListResponse {
        count: data.len(),
        data,
        scope: scope.as_str().to_string(),
        period: period.as_str().to_string(),
    }))
}

/// Trending routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/trending", get(list_trending))
}
