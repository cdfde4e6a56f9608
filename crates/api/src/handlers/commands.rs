//! Handlers for listing and running registered commands.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use servecmd_core::execution::output::ExecutionResult;

use crate::error::AppResult;
use crate::request::CommandParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Public description of one declared parameter.
#[derive(Debug, Serialize)]
pub struct ParamSummary {
    pub name: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Public description of a registered command.
#[derive(Debug, Serialize)]
pub struct CommandSummary {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<ParamSummary>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/commands
///
/// List registered commands, sorted by name.
pub async fn list_commands(State(state): State<AppState>) -> Json<DataResponse<Vec<CommandSummary>>> {
    let registry = state.runner.registry();
    let commands = registry
        .names()
        .into_iter()
        .filter_map(|name| registry.lookup(name))
        .map(|spec| CommandSummary {
            name: spec.name.clone(),
            description: spec.description.clone(),
            params: spec
                .params
                .iter()
                .map(|(name, param)| ParamSummary {
                    name: name.clone(),
                    required: param.required,
                    kind: param.kind.as_str(),
                })
                .collect(),
        })
        .collect();

    Json(DataResponse { data: commands })
}

/// POST /api/v1/commands/{name}
///
/// Run a registered command with the parameters carried by the request body.
pub async fn run_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
    CommandParams(params): CommandParams,
) -> AppResult<Json<DataResponse<ExecutionResult>>> {
    let result = state.runner.run(&name, params).await?;
    Ok(Json(DataResponse { data: result }))
}
