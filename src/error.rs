//! Application error types

use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    /// Metric name has no entry in the improvement table
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Errors scoped to a single chart. The pipeline logs these and moves on
    /// to the next chart instead of aborting the run.
    pub fn is_chart_scoped(&self) -> bool {
        matches!(self, AppError::UnknownMetric(_) | AppError::NotFound(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<object_store::Error> for AppError {
    fn from(err: object_store::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidPayload(err.to_string())
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::InvalidPayload(err.to_string())
    }
}
