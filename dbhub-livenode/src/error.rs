//! Live-node error taxonomy (§7 realized for C3), mapped onto
//! [`dbhub_types::job::JobQueueErrorCode`] at the response boundary.

use dbhub_types::job::JobQueueErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveNodeError {
    #[error("unknown live database {owner}/{name}")]
    NotFound { owner: String, name: String },

    #[error("requested table not present: {0}")]
    TableNotPresent(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("integrity check failed for {owner}/{name}")]
    IntegrityFailure { owner: String, name: String },

    #[error(transparent)]
    Session(#[from] dbhub_sqlite_session::SessionError),

    #[error(transparent)]
    Diff(#[from] dbhub_diffengine::DiffError),

    #[error(transparent)]
    Metadata(#[from] dbhub_metadata::MetadataError),

    #[error(transparent)]
    JobQueue(#[from] dbhub_jobqueue::JobQueueError),

    #[error(transparent)]
    BlobStore(#[from] crate::blobstore::BlobStoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LiveNodeError {
    pub fn code(&self) -> JobQueueErrorCode {
        match self {
            LiveNodeError::TableNotPresent(_) => JobQueueErrorCode::RequestedTableNotPresent,
            _ => JobQueueErrorCode::NoError,
        }
    }
}

pub type LiveNodeResult<T> = Result<T, LiveNodeError>;
