//! Abstract error kinds shared across the pipeline.
//!
//! Individual modules define narrower `thiserror` enums for their own
//! failure modes (`BlobStoreError`, `QueueError`, ...) and convert into
//! `PipelineError` at the boundary with `#[from]`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("provider error (retryable): {0}")]
    ProviderRetryable(String),

    #[error("provider error (fatal): {0}")]
    ProviderFatal(String),

    #[error("storage failed: {0}")]
    StorageFailed(String),

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid state transition: {0}")]
    StateInvalidTransition(String),

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    #[error(transparent)]
    BsonSer(#[from] bson::ser::Error),

    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Unauthorized => StatusCode::UNAUTHORIZED,
            PipelineError::Forbidden(_) => StatusCode::FORBIDDEN,
            PipelineError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            PipelineError::Conflict(_) => StatusCode::CONFLICT,
            PipelineError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            PipelineError::ProviderRetryable(_) => StatusCode::BAD_GATEWAY,
            PipelineError::ProviderFatal(_) => StatusCode::BAD_GATEWAY,
            PipelineError::StorageFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::OcrFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::DecryptionFailed => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::StateInvalidTransition(_) => StatusCode::CONFLICT,
            PipelineError::Mongo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::BsonSer(_) | PipelineError::BsonDe(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Json(_) => StatusCode::BAD_REQUEST,
            PipelineError::Bcrypt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = match &self {
            // Internal faults don't leak details to clients.
            PipelineError::Mongo(_)
            | PipelineError::Other(_)
            | PipelineError::BsonSer(_)
            | PipelineError::BsonDe(_)
            | PipelineError::Bcrypt(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        (status, axum::Json(ErrorBody { detail })).into_response()
    }
}
