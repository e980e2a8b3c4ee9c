//! Relay error types.
//!
//! Every variant maps to an HTTP status with a short plain-text body.
//! The enum implements [`axum::response::IntoResponse`] so handlers can
//! simply return `Err(RelayError::NotFound { .. })`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes)
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No object is stored under the requested key.
    #[error("File not found")]
    NotFound { key: String },

    /// The HTTP method is not served.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The blob store (or anything else underneath) failed.
    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl RelayError {
    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::InternalError(err) => tracing::error!("Request failed: {:#}", err),
            RelayError::NotFound { key } => tracing::debug!("No object for key {}", key),
            RelayError::MethodNotAllowed => {}
        }

        (
            self.status_code(),
            [("content-type", "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}
