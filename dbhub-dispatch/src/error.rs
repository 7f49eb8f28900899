//! The unified dispatch-API error (§7): every crate's error taxonomy funnels
//! into this one at the boundary the front-end talks to.

use dbhub_types::job::JobQueueErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("database not found")]
    PermissionDenied,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity check failed")]
    IntegrityFailure,

    #[error("job queue error: {message}")]
    JobQueueError {
        message: String,
        code: JobQueueErrorCode,
    },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal configuration error: {0}")]
    Fatal(String),
}

impl From<dbhub_responsemux::MuxError> for DispatchError {
    fn from(e: dbhub_responsemux::MuxError) -> Self {
        match e {
            dbhub_responsemux::MuxError::Timeout(_) | dbhub_responsemux::MuxError::ChannelClosed(_) => {
                DispatchError::Transient(e.to_string())
            }
            dbhub_responsemux::MuxError::Decode(_) => DispatchError::Validation(e.to_string()),
            dbhub_responsemux::MuxError::JobQueue(_) => DispatchError::Transient(e.to_string()),
        }
    }
}

impl From<dbhub_jobqueue::JobQueueError> for DispatchError {
    fn from(e: dbhub_jobqueue::JobQueueError) -> Self {
        DispatchError::Transient(e.to_string())
    }
}

impl From<dbhub_metadata::MetadataError> for DispatchError {
    fn from(e: dbhub_metadata::MetadataError) -> Self {
        match e {
            dbhub_metadata::MetadataError::PermissionDenied => DispatchError::PermissionDenied,
            dbhub_metadata::MetadataError::NotFound(m) => DispatchError::NotFound(m),
            dbhub_metadata::MetadataError::Validation(m) => DispatchError::Validation(m),
            dbhub_metadata::MetadataError::Conflict(m) => DispatchError::Conflict(m),
            dbhub_metadata::MetadataError::Transient(e) => DispatchError::Transient(e.to_string()),
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
