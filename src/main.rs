//! trend-engine entry point.
//!
//! `serve` (the default) starts the HTTP API. `run-job <job>` runs one
//! batch job, prints the finished run as JSON and exits non-zero when the
//! run failed, for cron-style schedulers.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use clap::{Parser, Subcommand};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trend_engine::api;
use trend_engine::app_state::AppState;
use trend_engine::config::{EngineConfig, StoreBackend};
use trend_engine::domain::JobStatus;
use trend_engine::persistence::Stores;
use trend_engine::persistence::memory::InMemoryStore;
use trend_engine::persistence::postgres::PostgresStore;

#[derive(Debug, Parser)]
#[command(name = "trend-engine", version, about = "Trend scoring and recommendation engine")]
struct Cli {
    /// Storage backend: postgres or memory
    #[arg(long, env = "STORE_BACKEND", global = true)]
    store: Option<StoreBackend>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the REST API
    Serve,
    /// Run one batch job and exit
    RunJob {
        /// telemetry_rollup, trending_refresh or seed_sample
        job: String,
        /// Target day, YYYY-MM-DD or RFC 3339 (default: yesterday UTC)
        #[arg(long)]
        date: Option<String>,
    },
}

/// Logs always go to stderr so `run-job` can keep stdout for the run JSON.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().with_target(false).init();
    } else {
        builder.init();
    }
}

async fn open_stores(config: &EngineConfig) -> anyhow::Result<Stores> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(config)
                .await
                .context("connecting to PostgreSQL")?;
            Ok(Stores::shared(&Arc::new(store)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Ok(Stores::shared(&Arc::new(InMemoryStore::new())))
        }
    }
}

async fn serve(config: &EngineConfig, state: AppState) -> anyhow::Result<()> {
    let app = Router::new().merge(api::build_router());

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    let app = app
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::GATEWAY_TIMEOUT,
                    Duration::from_secs(config.http_request_timeout_secs),
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(store) = cli.store {
        config.store_backend = store;
    }
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    init_tracing(config.log_json);
    tracing::info!(store = config.store_backend.as_str(), "starting trend-engine");

    let stores = open_stores(&config).await?;
    let state = AppState::new(stores, config.store_backend, config.tier_timeout());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(&config, state).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::RunJob { job, date } => {
            let run = state.jobs.run(&job, date.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(match run.status {
                JobStatus::Failed => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }
    }
}
