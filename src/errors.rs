use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// JSON error envelope returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Errors raised by the service layer.
///
/// Row-level problems during a reconciliation batch are NOT errors: they
/// accumulate as warnings in the batch result and never abort the batch.
/// Everything here aborts the single operation it occurred in, with no
/// partial commit.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown vendor, purchase order, or purchase-order-item id.
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    /// Corrupt upload, missing sheet or header row. Reported as row 0.
    #[error("Document read error: {0}")]
    DocumentRead(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Version-stamp conflict that survived the retry bound.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) | ServiceError::ReferenceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::DocumentRead(_)
            | ServiceError::ValidationError(_)
            | ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::ConcurrentModification(_) => StatusCode::CONFLICT,
            ServiceError::DatabaseError(_)
            | ServiceError::EventError(_)
            | ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: self.to_string(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

/// Infrastructure errors from startup and the persistence boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::DatabaseError(e) => AppError::DatabaseError(e),
            other => AppError::ConfigError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_misses_map_to_not_found() {
        assert_eq!(
            ServiceError::ReferenceNotFound("PO 9".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(
            ServiceError::ConcurrentModification("item 1".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn document_errors_map_to_400() {
        assert_eq!(
            ServiceError::DocumentRead("empty workbook".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
