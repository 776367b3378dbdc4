use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;

use keygate_storage::StorageError;

use crate::hasher::HashError;
use crate::secret::SecretError;

#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error("invalid API key format")]
    InvalidFormat,
    #[error("API key not found")]
    NotFound,
    #[error("API key expired")]
    Expired,
    #[error("invalid API key")]
    Invalid,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("hash error: {0}")]
    Hash(#[from] HashError),
    #[error("secret generation failed: {0}")]
    Secret(#[from] SecretError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiKeyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiKeyError::InvalidFormat
            | ApiKeyError::NotFound
            | ApiKeyError::Expired
            | ApiKeyError::Invalid
            | ApiKeyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiKeyError::Storage(_)
            | ApiKeyError::Hash(_)
            | ApiKeyError::Secret(_)
            | ApiKeyError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// True for the outcomes a presented secret can produce at validation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ApiKeyError::InvalidFormat
                | ApiKeyError::NotFound
                | ApiKeyError::Expired
                | ApiKeyError::Invalid
        )
    }
}

/// JSON error returned by every HTTP edge: `{code, message, error?}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attaches `detail` only when the server exposes error details.
    pub fn with_detail(mut self, detail: impl ToString, expose: bool) -> Self {
        if expose {
            self.detail = Some(detail.to_string());
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.status.as_u16(),
            message: &self.message,
            error: self.detail.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}
