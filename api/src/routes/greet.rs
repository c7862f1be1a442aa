//! Root and greeting endpoints.

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;

/// Query parameters for the greeting endpoint.
#[derive(Debug, Deserialize)]
pub struct GreetParams {
    /// Name to greet; defaults to "Guest".
    pub name: Option<String>,
}

/// Creates the root and greeting routes.
pub fn greet_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/greet", get(greet))
        .with_state(state)
}

async fn root() -> &'static str {
    "Server is ready"
}

async fn greet(State(state): State<AppState>, Query(params): Query<GreetParams>) -> String {
    state
        .requests()
        .add(1.0, &[("method", "GET"), ("route", "/greet")]);

    let name = params.name.unwrap_or_else(|| "Guest".to_string());
    format!("Hello, {name}! Welcome to the server.")
}
