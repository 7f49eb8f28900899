//! Error taxonomy for the metadata DAO surface (§7 realized for C7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("metadata store error: {0}")]
    Transient(#[source] sqlx::Error),
}

impl From<sqlx::Error> for MetadataError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => MetadataError::NotFound("row not found".to_string()),
            other => MetadataError::Transient(other),
        }
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;
