//! HTTP error type.
//!
//! Handlers return `Result<T, ServerError>`; the [`IntoResponse`] impl turns
//! errors into a JSON body `{"error": <code>, "message": <text>}` with a
//! matching status code. Internal errors are logged in full but only a
//! generic message reaches the client.

use crate::error::{BatchError, ConversionError};
use crate::format::Format;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The request was malformed.
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    /// A single-file conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The batch was rejected as a whole.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The request body exceeded the configured upload limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ServerError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest { .. } | ServerError::Batch(_) => StatusCode::BAD_REQUEST,
            ServerError::Conversion(e) => conversion_status(e),
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status code reported when a single-file conversion fails.
pub fn conversion_status(error: &ConversionError) -> StatusCode {
    match error {
        ConversionError::UnsupportedFormat(_)
        | ConversionError::MismatchedKind { .. }
        | ConversionError::MissingFile(_) => StatusCode::BAD_REQUEST,
        ConversionError::CorruptInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ConversionError::ConversionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ConversionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ServerError::BadRequest { code, message } => json!({ "error": code, "message": message }),
            ServerError::Conversion(e @ ConversionError::UnsupportedFormat(_)) => json!({
                "error": e.code(),
                "message": e.to_string(),
                "supported_extensions": Format::supported_extensions(),
            }),
            ServerError::Conversion(e) => json!({ "error": e.code(), "message": e.to_string() }),
            ServerError::Batch(e) => json!({ "error": e.code(), "message": e.to_string() }),
            ServerError::PayloadTooLarge(m) => json!({ "error": "payload_too_large", "message": m }),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                json!({ "error": "internal_error", "message": "internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
