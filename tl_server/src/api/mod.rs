//! HTTP API for the ledger server.
//!
//! # Modules
//!
//! - [`ledger`]: Settlement endpoints (fund, take, tournaments, balance, reset)
//! - [`request_id`]: Request ID propagation and access logging
//!
//! # Endpoints Overview
//!
//! ```text
//! POST /take?playerId=&points=
//! POST /fund?playerId=&points=
//! POST /announceTournament?tournamentId=&deposit=
//! POST /joinTournament?tournamentId=&playerId=&backers=
//! POST /resultTournament                 - JSON results body
//! GET  /balance?playerId=
//! POST /reset                            - Drop everything, seed default players
//! GET  /health
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tl_server::api::{create_router, AppState};
//! use tourney_ledger::{EngineConfig, SettlementEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState {
//!     engine: Arc::new(SettlementEngine::in_memory(EngineConfig::default())),
//!     database: None,
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5909").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tourney_ledger::SettlementEngine;
use tourney_ledger::db::Database;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// - `engine`: Settlement engine every ledger route goes through
/// - `database`: Connection pool checked by `/health`; `None` for an
///   engine over in-memory stores
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub database: Option<Database>,
}

/// Create the API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/take", post(ledger::take))
        .route("/fund", post(ledger::fund))
        .route("/announceTournament", post(ledger::announce_tournament))
        .route("/joinTournament", post(ledger::join_tournament))
        .route("/resultTournament", post(ledger::result_tournament))
        .route("/balance", get(ledger::balance))
        .route("/reset", post(ledger::reset))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database answers (or no database is attached),
/// `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://127.0.0.1:5909/health
/// # {"status":"healthy","version":"0.1.0","database":true,"timestamp":"2026-10-18T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.database {
        Some(db) => Some(db.health_check().await.is_ok()),
        None => None,
    };
    let healthy = database.unwrap_or(true);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
