use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::orchestrator::ChatError;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request body was malformed or incomplete.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The tenant token resolved to nothing.
    #[error("knowledge base not found")]
    UnknownTenant,

    /// Anything else. The payload stays generic; details go to the log.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ChatError> for GatewayError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::UnknownTenant => GatewayError::UnknownTenant,
            ChatError::EmptyQuery => GatewayError::InvalidRequest("query must not be empty".into()),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// JSON error body.
#[derive(serde::Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// HTTP status code, mirrored into the body.
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnknownTenant => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
