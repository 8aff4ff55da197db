//! Scrub Server - HTTP entry point
//!
//! Wires the cleaning pipeline into an axum router:
//! 1. Builds the shared [`AppState`] (store, tracker, import coordinator)
//! 2. Registers every route under `/api/module9`, `/api/data` and
//!    `/api/database`, plus `/health`
//! 3. Starts the scheduler that fires due imports and fails overdue operations
//! 4. Serves until the process is stopped
//!
//! ```text
//! ┌──────────────────────────── axum Router ─────────────────────────────┐
//! │  /api/module9/*   cleaning: import, dedup, fill, normalize, outliers │
//! │  /api/data/*      uploads, scheduled imports, counters, db status    │
//! │  /api/database/*  connect                                            │
//! │  /health                                                             │
//! │  layers: TraceLayer, CorsLayer                                       │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                       AppState { Pipeline, ImportCoordinator }
//!                                   │
//!                 scheduler task (tick: fire due jobs, sweep timeouts)
//! ```

pub mod config;
pub mod response;
pub mod routes;
pub mod scheduler;
pub mod state;

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;
pub use state::AppState;

use routes::{cleaning, database, imports};

/// Build the router with every route and middleware layer.
pub fn router(state: AppState) -> Router {
    let module9 = Router::new()
        .route("/import", post(cleaning::import))
        .route("/remove_duplicates", post(cleaning::remove_duplicates))
        .route("/fill_missing", post(cleaning::fill_missing))
        .route("/normalize", post(cleaning::normalize))
        .route("/detect_outliers", post(cleaning::detect_outliers))
        .route("/progress", get(cleaning::progress))
        .route("/export", get(cleaning::export));

    let data = Router::new()
        .route("/upload", post(imports::upload))
        .route("/schedule-import", post(imports::schedule_import))
        .route("/view-scheduled-imports", get(imports::view_scheduled_imports))
        .route("/cancel-scheduled-import", post(imports::cancel_scheduled_import))
        .route("/view-imported", get(imports::view_imported))
        .route("/import-progress", get(imports::import_progress))
        .route("/database-status", get(database::database_status));

    Router::new()
        .nest("/api/module9", module9)
        .nest("/api/data", data)
        .route("/api/database/connect", get(database::connect))
        .route("/health", get(database::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Serve the API until the process is stopped.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.cleaning_config()?, config.operation_timeout())?;
    let scheduler = scheduler::spawn(state.clone(), config.scheduler_tick());

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Scrub server listening on http://{}", addr);

    let served = axum::serve(listener, router(state)).await;
    scheduler.abort();
    served.context("Server error")
}
