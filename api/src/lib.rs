//! Storelens API Server
//!
//! This crate provides the HTTP server for the Storelens product service.
//! It exposes a handful of routes (greeting, product create/list, health)
//! backed by a product store, with the telemetry stack from the
//! [`telemetry`] crate wired through every handler.
//!
//! # Architecture
//!
//! The server is built on Axum and Tokio:
//! - route handlers open one span per operation and seal it on every path
//! - a shared counter instrument tracks handled requests
//! - the service logger writes to console and the combined log file
//! - on shutdown, both telemetry pipelines get a bounded chance to flush
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod db;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use state::AppState;

use crate::db::{Database, DatabaseConfig};
use crate::store::ClickHouseProductStore;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{Telemetry, TelemetryConfig};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Bound on the telemetry flush at shutdown; the process exits after this
/// even if buffered data could not be exported.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the Storelens API server.
///
/// Initializes the server and telemetry stack from environment variables
/// and listens for incoming connections, handling graceful shutdown on
/// SIGTERM/SIGINT.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The log file cannot be opened
/// - The database is unreachable at startup
/// - The server fails to bind to the configured address
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    let telemetry_config = TelemetryConfig::from_env()?;
    run_server_with_config(config, telemetry_config).await
}

/// Runs the Storelens API server with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration
/// programmatically.
///
/// # Errors
///
/// Returns an error under the same conditions as [`run_server`].
pub async fn run_server_with_config(
    config: Config,
    telemetry_config: TelemetryConfig,
) -> Result<()> {
    let telemetry = Arc::new(Telemetry::init(telemetry_config)?);
    telemetry.logger().info("Server starting...");
    telemetry.logger().info("Initializing database connection...");

    // An unreachable database is fatal: terminate rather than serve
    // degraded traffic.
    let database = Database::new(&DatabaseConfig::from_env()?);
    database
        .ping()
        .await
        .context("Database unreachable at startup")?;

    let store = ClickHouseProductStore::new_shared(database.client());
    store
        .ensure_schema()
        .await
        .context("Failed to prepare products table")?;

    let state = AppState::new(store, Arc::clone(&telemetry));
    let app = create_router(state);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    telemetry
        .logger()
        .info(format!("Server started at http://localhost:{}", config.port));
    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry.shutdown(SHUTDOWN_TIMEOUT).await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a
/// full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::greet_routes(state.clone()))
        .merge(routes::product_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
