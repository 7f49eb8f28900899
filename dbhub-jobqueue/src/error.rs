//! Error taxonomy for the job queue (§7 realized for C4).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("job {0} not found")]
    NotFound(dbhub_types::JobId),

    #[error("job details could not be (de)serialised: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("queue backend error: {0}")]
    Transient(#[source] sqlx::Error),
}

impl From<sqlx::Error> for JobQueueError {
    fn from(e: sqlx::Error) -> Self {
        JobQueueError::Transient(e)
    }
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;
