//! Error taxonomy for the response multiplexer (§7 realized for C5).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("timed out waiting for a response to job {0}")]
    Timeout(dbhub_types::JobId),

    #[error("response channel for job {0} closed without a value")]
    ChannelClosed(dbhub_types::JobId),

    #[error("response payload did not match the expected shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("job queue error: {0}")]
    JobQueue(#[from] dbhub_jobqueue::JobQueueError),
}

pub type MuxResult<T> = Result<T, MuxError>;
