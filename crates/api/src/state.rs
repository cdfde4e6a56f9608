use std::sync::Arc;

use servecmd_core::execution::runner::CommandRunner;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Command runner over the read-only command registry.
    pub runner: Arc<CommandRunner>,
}
