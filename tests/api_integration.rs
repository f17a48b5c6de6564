//! API integration tests for the REST endpoints.
//!
//! Most tests send synthetic requests straight into the Axum router with
//! `tower::ServiceExt::oneshot`, so no listener is started. One test binds
//! an ephemeral port and talks to the served app over HTTP with `reqwest`.
//!
//! # Prerequisites
//!
//! - None. The router is wired to a fresh [`InMemoryStore`] per test.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test api_integration
//! ```
//!
//! # Testing strategy
//!
//! Tests are grouped by route: health, recommendations, trending, and jobs.
//! Validation failures must come back as 400 with the JSON error body and
//! must not leave a job run behind. `get()` and `post()` return
//! `(StatusCode, serde_json::Value)` tuples for concise assertions.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use common::{TIER_TIMEOUT, card, day, event, memory_stores};
use trend_engine::api;
use trend_engine::app_state::AppState;
use trend_engine::config::StoreBackend;
use trend_engine::domain::{Document, EventType, Period, Scope, TrendingSnapshot};
use trend_engine::persistence::memory::{InMemoryStore, Outage};
use trend_engine::persistence::{JobRunStore, TrendStore};

fn app() -> (Arc<InMemoryStore>, Router) {
    let (store, stores) = memory_stores();
    let state = AppState::new(stores, StoreBackend::Memory, TIER_TIMEOUT);
    (store, api::build_router().with_state(state))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let Ok(response) = app.oneshot(request).await else {
        panic!("router rejected request");
    };
    let status = response.status();
    let Ok(collected) = response.into_body().collect().await else {
        panic!("body read failed");
    };
    let body = serde_json::from_slice(&collected.to_bytes()).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let Ok(request) = Request::get(uri).body(Body::empty()) else {
        panic!("bad request {uri}");
    };
    send(app, request).await
}

async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let Ok(request) = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
    else {
        panic!("bad request {uri}");
    };
    send(app, request).await
}

// == Health =====================================================================

#[tokio::test]
async fn health_reports_store_backend() {
    let (_, app) = app();
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert!(body["last_job_run_at"].is_null());
}

#[tokio::test]
async fn health_degrades_when_job_store_is_down() {
    let (store, app) = app();
    store.set_outage(Outage::total()).await;
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
}

// == Recommendations ============================================================

#[tokio::test]
async fn empty_store_serves_fallback_seeds() {
    let (_, app) = app();
    let (status, body) = get(app, "/api/v1/recommendations?scope=deck&limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["resolver"], "fallback");
    assert_eq!(body["meta"]["count"], 3);
    let Some(data) = body["data"].as_array() else {
        panic!("data is not an array: {body}");
    };
    assert_eq!(data.len(), 3);
    assert!(data.iter().all(|s| s["fallback"] == true && s["source"] == "fallback"));
    assert_eq!(data[2]["rank"], 3);
}

#[tokio::test]
async fn recommendation_input_errors_are_bad_request() {
    for uri in [
        "/api/v1/recommendations",
        "/api/v1/recommendations?scope=binder",
        "/api/v1/recommendations?scope=card&subject_id=not-a-uuid",
        "/api/v1/recommendations?scope=card&limit=lots",
        "/api/v1/recommendations?scope=card&period=hourly",
    ] {
        let (_, app) = app();
        let (status, body) = get(app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"]["code"].as_u64().is_some_and(|c| (1000..2000).contains(&c)));
    }
}

#[tokio::test]
async fn subject_request_echoes_meta() {
    let (store, app) = app();
    let subject = card("Subject", "Creature — Elf", &["G"], &[]);
    let peer = card("Peer", "Creature — Elf", &["G"], &[]);
    store.insert_cards(vec![subject.clone(), peer.clone()]).await;

    let uri = format!(
        "/api/v1/recommendations?scope=card&subject_id={}&surface=deck_builder",
        subject.id
    );
    let (status, body) = get(app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["resolver"], "heuristic");
    assert_eq!(body["meta"]["surface"], "deck_builder");
    assert_eq!(body["data"][0]["target_id"], peer.id.to_string());
    assert_eq!(body["data"][0]["source"], "similar_card");
}

// == Trending ===================================================================

#[tokio::test]
async fn trending_lists_snapshots_in_score_order() {
    let (store, app) = app();
    let low = card("Low", "Instant", &["R"], &[]);
    let high = card("High", "Instant", &["R"], &[]);
    store.insert_cards(vec![low.clone(), high.clone()]).await;
    let snapshot = |id, trend_score| TrendingSnapshot {
        scope: Scope::Card,
        subject_id: id,
        period: Period::Daily,
        trend_score,
        components: Document::new().with("views", 1),
        calculated_at: Utc::now(),
    };
    let Ok(()) = store
        .upsert_snapshots(&[snapshot(low.id, 1.0), snapshot(high.id, 2.0)])
        .await
    else {
        panic!("snapshot upsert failed");
    };

    let (status, body) = get(app, "/api/v1/trending?scope=card").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["period"], "daily");
    assert_eq!(body["data"][0]["subject_id"], high.id.to_string());
    assert_eq!(body["data"][0]["rank"], 1);
    assert_eq!(body["data"][1]["rank"], 2);
}

#[tokio::test]
async fn trending_requires_scope() {
    let (_, app) = app();
    let (status, _) = get(app, "/api/v1/trending").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == Jobs =======================================================================

#[tokio::test]
async fn triggered_rollup_is_listed() {
    let (store, app) = app();
    let subject = Uuid::new_v4();
    store
        .insert_events(vec![event(EventType::CardViewed, subject, Some("u1"))])
        .await;

    let body = format!(r#"{{"target_date":"{}"}}"#, day());
    let (status, run) = post(app.clone(), "/api/v1/jobs/telemetry_rollup/runs", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "succeeded");
    assert_eq!(run["metadata"]["card_metrics_updated"], 1);

    let (status, list) = get(app, "/api/v1/jobs/runs?job_type=telemetry_rollup").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["id"], run["id"]);
}

#[tokio::test]
async fn trigger_without_body_defaults_to_yesterday() {
    let (_, app) = app();
    let (status, run) = post(app, "/api/v1/jobs/trending-refresh/runs", "").await;
    assert_eq!(status, StatusCode::OK);
    let yesterday = (Utc::now() - chrono::Duration::days(1)).date_naive();
    assert_eq!(run["metadata"]["metric_date"], yesterday.to_string());
}

#[tokio::test]
async fn bad_trigger_records_nothing() {
    let (store, app) = app();
    let (status, body) = post(app.clone(), "/api/v1/jobs/reindex/runs", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1003);

    let (status, _) = post(
        app.clone(),
        "/api/v1/jobs/telemetry_rollup/runs",
        r#"{"target_date":"April 2nd"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(app, "/api/v1/jobs/telemetry_rollup/runs", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let Ok(runs) = store.recent_runs(None, 10).await else {
        panic!("listing runs failed");
    };
    assert!(runs.is_empty());
}

#[tokio::test]
async fn failed_run_is_server_error() {
    let (store, app) = app();
    store
        .set_outage(Outage {
            events: true,
            ..Default::default()
        })
        .await;
    let (status, run) = post(app, "/api/v1/jobs/telemetry_rollup/runs", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(run["status"], "failed");
    assert!(run["error_message"].as_str().is_some_and(|m| !m.is_empty()));
}

// == Served =====================================================================

#[tokio::test]
async fn served_app_answers_over_http() {
    let (_, app) = app();
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let url = format!("http://{addr}/api/v1/recommendations?scope=card");
    let Ok(response) = reqwest::get(&url).await else {
        panic!("request to {url} failed");
    };
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let Ok(body) = response.json::<Value>().await else {
        panic!("body was not JSON");
    };
    assert_eq!(body["meta"]["resolver"], "fallback");
    assert_eq!(body["meta"]["count"], 8);
}
