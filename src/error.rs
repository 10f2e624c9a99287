use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable failure reason reported by code derivation and imports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    ReferenceError,
    DuplicateCode,
    InvalidInput,
    StorageError,
}

/// Catalog domain errors (code derivation, import, category writes)
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Reference(String),

    #[error("{0}")]
    DuplicateCode(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(DbErr),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Validation(_) => ErrorKind::ValidationError,
            CatalogError::Reference(_) => ErrorKind::ReferenceError,
            CatalogError::DuplicateCode(_) => ErrorKind::DuplicateCode,
            CatalogError::InvalidInput(_) => ErrorKind::InvalidInput,
            CatalogError::Storage(_) => ErrorKind::StorageError,
        }
    }
}

/// Unique-constraint violations surface as `DuplicateCode`; the only unique
/// column written by the catalog is `activity_category.code`.
impl From<DbErr> for CatalogError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                CatalogError::DuplicateCode(format!("category code already exists ({})", detail))
            }
            _ => CatalogError::Storage(err),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", None)
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database Error", None)
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Validation Error", Some(msg.clone()))
            }
            AppError::Catalog(err) => match err.kind() {
                ErrorKind::ValidationError | ErrorKind::InvalidInput => {
                    (StatusCode::BAD_REQUEST, "Validation Error", Some(err.to_string()))
                }
                ErrorKind::ReferenceError => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "Reference Error", Some(err.to_string()))
                }
                ErrorKind::DuplicateCode => {
                    (StatusCode::CONFLICT, "Duplicate Code", Some(err.to_string()))
                }
                ErrorKind::StorageError => {
                    tracing::error!("Storage error: {}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database Error", None)
                }
            },
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            message: message.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}
