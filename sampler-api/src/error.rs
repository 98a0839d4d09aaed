//! Error types for sampler-api
//!
//! Every catalog operation ends in exactly one of these kinds. Adapter errors
//! are translated by the engine before they get here.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Catalog error taxonomy
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed or missing fields (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced preset, sample or file absent (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate name, capacity reached, concurrent creation (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Filesystem I/O error (500)
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Metadata store read/write error (500)
    #[error("Metadata failure: {0}")]
    MetadataFailure(String),

    /// Unexpected error (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Machine-readable kind carried in the response body
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::InvalidInput(_) => "INVALID_INPUT",
            CatalogError::NotFound(_) => "NOT_FOUND",
            CatalogError::Conflict(_) => "CONFLICT",
            CatalogError::StorageFailure(_) => "STORAGE_FAILURE",
            CatalogError::MetadataFailure(_) => "METADATA_FAILURE",
            CatalogError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Conflict(_) => StatusCode::CONFLICT,
            CatalogError::StorageFailure(_)
            | CatalogError::MetadataFailure(_)
            | CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sampler_common::Error> for CatalogError {
    fn from(err: sampler_common::Error) -> Self {
        match err {
            sampler_common::Error::InvalidInput(msg) => CatalogError::InvalidInput(msg),
            other => CatalogError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for CatalogError {
    fn from(rejection: JsonRejection) -> Self {
        CatalogError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side detail stays in the log
        let message = match &self {
            CatalogError::InvalidInput(msg)
            | CatalogError::NotFound(msg)
            | CatalogError::Conflict(msg) => msg.clone(),
            CatalogError::StorageFailure(_) => {
                error!("{}", self);
                "Sample storage operation failed".to_string()
            }
            CatalogError::MetadataFailure(_) => {
                error!("{}", self);
                "Preset catalog operation failed".to_string()
            }
            CatalogError::Internal(_) => {
                error!("{}", self);
                "Internal Server Error".to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for catalog operations and handlers
pub type CatalogResult<T> = Result<T, CatalogError>;
