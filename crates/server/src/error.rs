//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_core::protocol::ErrorResponse;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("upload session not found")]
    UnknownSession,

    #[error("chunk mismatch: {0}")]
    ChunkMismatch(String),

    #[error("incomplete upload: {missing} chunk(s) missing")]
    IncompleteUpload { missing: usize },

    #[error("upload already completed")]
    AlreadyCompleted,

    #[error("assembly error: {0}")]
    Assembly(String),

    #[error("storage error: {0}")]
    Storage(#[from] depot_storage::StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UnknownSession => "unknown_session",
            Self::ChunkMismatch(_) => "chunk_mismatch",
            Self::IncompleteUpload { .. } => "incomplete_upload",
            Self::AlreadyCompleted => "already_completed",
            Self::Assembly(_) => "assembly_error",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSession => StatusCode::NOT_FOUND,
            Self::ChunkMismatch(_) => StatusCode::BAD_REQUEST,
            Self::IncompleteUpload { .. } => StatusCode::BAD_REQUEST,
            Self::AlreadyCompleted => StatusCode::CONFLICT,
            Self::Assembly(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                depot_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                depot_storage::StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_status() {
        let cases: Vec<(ApiError, &str, StatusCode)> = vec![
            (
                ApiError::Validation("x".into()),
                "validation_error",
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::UnknownSession,
                "unknown_session",
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::ChunkMismatch("x".into()),
                "chunk_mismatch",
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::IncompleteUpload { missing: 2 },
                "incomplete_upload",
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::AlreadyCompleted,
                "already_completed",
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Assembly("x".into()),
                "assembly_error",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status_code(), status);
        }
    }
}
