//! Error handling for the HTTP API layer.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl maps
//! each failure onto the HTTP status the management contract promises and a
//! JSON body of the form `{"error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reward_relay_core::error::RelayError;
use thiserror::Error;
use tracing::{error, warn};

/// Failures surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A pipeline operation failed; the variant decides the status code.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// A request arrived without a header the endpoint requires.
    #[error("missing required header {header}")]
    MissingHeader { header: &'static str },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingHeader { .. } => StatusCode::BAD_REQUEST,
            ApiError::Relay(error) => match error {
                RelayError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
                RelayError::Conflict { .. } => StatusCode::CONFLICT,
                RelayError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
                RelayError::Connection { .. }
                | RelayError::QueueFull
                | RelayError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        let detail = self.to_string();
        if status.is_server_error() {
            error!(status = %status, detail = %detail, "request failed");
        } else if status != StatusCode::UNAUTHORIZED {
            // Unauthorized requests are routine probing noise; everything else
            // that the client got wrong is worth a trace.
            warn!(status = %status, detail = %detail, "request rejected");
        }

        (status, Json(serde_json::json!({ "error": detail }))).into_response()
    }
}
