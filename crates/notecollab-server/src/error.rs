//! API error types with JSON responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::collab::CollabError;

/// API error that can be returned from handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Unauthorized (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The connection has left its room (410).
    ///
    /// Handlers never produce this today: `TransportClosed` only arises on
    /// realtime connections, which report it as a `closed` error frame. The
    /// mapping keeps `From<CollabError>` total so an HTTP caller of the hub
    /// gets a meaningful status.
    #[error("gone: {0}")]
    Gone(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Store error. The message never reaches the client.
    #[error("persistence error")]
    Store(#[from] notecollab_store::StoreError),
}

impl ApiError {
    /// Get the error code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Gone(_) => "GONE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Gone(_) => StatusCode::GONE,
            Self::Internal(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CollabError> for ApiError {
    fn from(err: CollabError) -> Self {
        match err {
            CollabError::Unauthorized => Self::Unauthorized("missing or invalid credentials".into()),
            CollabError::Forbidden { .. } | CollabError::NotOwner => Self::Forbidden(err.to_string()),
            CollabError::NotFound(what) => Self::NotFound(what),
            CollabError::InvalidTier(value) => {
                Self::BadRequest(format!("invalid permission: {:?}", value))
            }
            CollabError::TransportClosed => Self::Gone("connection closed".into()),
            CollabError::Storage(e) => Self::Store(e),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetails,
}

/// Error details within the response.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    /// Error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Store(e) = &self {
            tracing::error!(error = %e, "Storage failure while handling request");
        }
        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
