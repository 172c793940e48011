//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use tunemate_core::CoreError;

/// All errors that can occur in the tunemate-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the matcher or the chat relay.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),

            ServerError::Core(e) => match e {
                CoreError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
                CoreError::InvalidMessage(m) => (StatusCode::BAD_REQUEST, m.clone()),
                CoreError::DataUnavailable(m) => {
                    error!(error = %m, "backing store unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "data temporarily unavailable".to_owned(),
                    )
                }
                // Internal errors: log the full detail, return a generic message.
                other => {
                    error!(error = %other, "internal server error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<tunemate_core::StoreError> for ServerError {
    fn from(e: tunemate_core::StoreError) -> Self {
        ServerError::Core(CoreError::PersistFailed(e.to_string()))
    }
}
