//! REST endpoint handlers organized by resource.

pub mod jobs;
pub mod recommendations;
pub mod system;
pub mod trending;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(recommendations::routes())
        .merge(trending::routes())
        .merge(jobs::routes())
}
