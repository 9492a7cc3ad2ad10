//! Errors surfaced by handlers and middleware.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::ModelError;
use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad or missing resource identifier.
    #[error("not found")]
    NotFound,

    /// Malformed input or a request the server refuses to act on.
    #[error("client error: {0}")]
    ClientError(StatusCode),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn status_text(status: StatusCode) -> (StatusCode, &'static str) {
    (status, status.canonical_reason().unwrap_or("Error"))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => status_text(StatusCode::NOT_FOUND).into_response(),
            Self::ClientError(status) => status_text(status).into_response(),
            err => {
                tracing::error!(error = %err, "internal server error");
                status_text(StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        }
    }
}
