pub mod commands;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /commands                 list registered commands (GET)
/// /commands/{name}          run a command (POST, JSON or multipart body)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/commands", commands::router())
}
