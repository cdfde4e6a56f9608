//! Route definitions for command endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::commands;
use crate::state::AppState;

/// Routes mounted at `/commands`.
///
/// ```text
/// GET    /                          -> list_commands
/// POST   /{name}                    -> run_command
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(commands::list_commands))
        .route("/{name}", post(commands::run_command))
}
