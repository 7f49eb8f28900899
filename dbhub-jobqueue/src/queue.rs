//! The `JobQueue` trait (§4.4): submission, per-node claiming, and the
//! response side the multiplexer (C5) drains.

use async_trait::async_trait;
use dbhub_types::{JobDetails, JobId, ResponseDetails};

use crate::error::JobQueueResult;
use crate::types::{ClaimedJob, ResponseRow};

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Inserts a new `job_submissions` row and returns its id (§4.4 Submit).
    async fn submit(&self, target_node: &str, submitter_node: &str, details: JobDetails) -> JobQueueResult<JobId>;

    /// Claims the oldest unclaimed job targeting `node_name` (or "any"),
    /// marking it `in_progress` under `SELECT ... FOR UPDATE SKIP LOCKED`
    /// (§4.4 claim loop). Returns `None` if nothing is claimable right now.
    async fn claim_next(&self, node_name: &str) -> JobQueueResult<Option<ClaimedJob>>;

    /// Records the live node's response and marks the submission row
    /// `complete` (§4.4 claim loop, final two steps).
    async fn complete(&self, job_id: JobId, submitter_node: &str, response: ResponseDetails) -> JobQueueResult<()>;

    /// Blocks until a `job_submissions_queue` notification arrives or
    /// `timeout` elapses, whichever is first (§4.4, §5 "5 seconds... on the
    /// notification connection").
    async fn wait_for_submission(&self, timeout: std::time::Duration) -> JobQueueResult<()>;

    /// Blocks until a `job_responses_queue` notification whose payload
    /// equals `submitter_node` arrives, or `timeout` elapses.
    async fn wait_for_response(&self, submitter_node: &str, timeout: std::time::Duration) -> JobQueueResult<()>;

    /// `SELECT ... WHERE processed_date IS NULL AND submitter_node = self
    /// ORDER BY response_date` (§4.5 response checker loop).
    async fn fetch_unprocessed_responses(&self, submitter_node: &str) -> JobQueueResult<Vec<ResponseRow>>;

    /// Marks one response row processed, whether or not a receiver was
    /// found for it (§5 "receiver channel map miss is a silent no-op").
    async fn mark_response_processed(&self, response_id: i64) -> JobQueueResult<()>;
}
