//! Tournament ledger server.
//!
//! Serves the settlement engine over HTTP, backed by PostgreSQL.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;
use tl_server::{
    api,
    config::{DEFAULT_BIND, ServerConfig},
    logging, metrics,
};
use tourney_ledger::{SettlementEngine, db::Database};
use tracing::{info, warn};

const HELP: &str = "\
Run the tournament ledger server

USAGE:
  tl_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:5909]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/tournament]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:5909)
  DATABASE_URL             PostgreSQL connection string
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  LEDGER_JOIN_GUARD        none | per_player
  LEDGER_MEMBERSHIP_LOOKUP player | tournament
  LEDGER_CLEANUP_POLICY    warn | strict
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url)?;
    config.validate()?;
    info!(
        "Starting tournament ledger server at {} (default {DEFAULT_BIND})",
        config.bind
    );
    info!(
        "Join guard: {}, membership lookup: {}, cleanup policy: {}",
        config.engine.join_guard, config.engine.membership_lookup, config.engine.cleanup_policy
    );

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    info!("Database connected successfully");

    let engine = SettlementEngine::postgres(db.pool().clone(), config.engine.clone());
    engine
        .ensure_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to prepare ledger schema: {}", e))?;

    match config.metrics_bind {
        Some(addr) => {
            metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
            info!("Prometheus metrics at http://{addr}/metrics");
        }
        None => warn!("METRICS_BIND not set, metrics exporter disabled"),
    }

    let state = api::AppState {
        engine: Arc::new(engine),
        database: Some(db.clone()),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {e}");
        std::future::pending::<()>().await;
    }
}
