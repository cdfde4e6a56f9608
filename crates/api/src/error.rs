use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use servecmd_core::error::RunError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`RunError`] for engine failures and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failed command run from `servecmd_core`.
    #[error(transparent)]
    Run(#[from] RunError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body exceeds `MAX_BODY_BYTES`.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- RunError variants ---
            AppError::Run(err) => classify_run_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                msg.clone(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a run error into an HTTP status, error code, and message.
///
/// - Unknown commands map to 404.
/// - Missing parameters and unrenderable command lines map to 400.
/// - Subprocess deadlines map to 504.
/// - I/O and spawn failures map to 500 with a sanitized message.
fn classify_run_error(err: &RunError) -> (StatusCode, &'static str, String) {
    if err.is_client_error() {
        let status = match err {
            RunError::CommandNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        return (status, err.code(), err.to_string());
    }

    if let RunError::Timeout { .. } = err {
        return (StatusCode::GATEWAY_TIMEOUT, err.code(), err.to_string());
    }

    tracing::error!(error = %err, code = err.code(), "Command run failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        err.code(),
        "An internal error occurred".to_string(),
    )
}
