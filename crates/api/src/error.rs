use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sse_hub_core::error::CoreError;
use sse_hub_events::HubError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`HubError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `sse_hub_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the event hub.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Hub(hub) => classify_hub_error(hub),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
    }
}

/// Classify a hub error into an HTTP status, error code, and message.
///
/// - Transport failures map to 503, since the event was not accepted.
/// - Wrapped core errors keep their own mapping.
/// - Everything else maps to 500 with a sanitized message.
fn classify_hub_error(err: &HubError) -> (StatusCode, &'static str, String) {
    match err {
        HubError::Core(core) => classify_core_error(core),
        HubError::Transport(msg) => {
            tracing::error!(error = %msg, "Broadcast transport rejected event");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "RELAY_UNAVAILABLE",
                "The event could not be handed to the broadcast channel".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Hub error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
