// Raiko
// Copyright (c) 2024 Taiko Labs
// Licensed and distributed under either of
//   * MIT license (license terms in the root directory or at http://opensource.org/licenses/MIT).
//   * Apache v2 license (license terms in the root directory or at http://www.apache.org/licenses/LICENSE-2.0).
// at your option. This file may not be copied, modified, or distributed except according to those terms.

//! In-memory `JobQueue` fake (mirroring the teacher's `InMemoryTaskDb`), so
//! claim-ordering and any-node dispatch (§8 end-to-end scenarios 1 and 2)
//! are testable without a live Postgres instance.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dbhub_types::{JobDetails, JobId, ResponseDetails};
use tokio::sync::{Mutex, Notify};

use crate::error::JobQueueResult;
use crate::queue::JobQueue;
use crate::types::{ClaimedJob, JobState, ResponseRow, ANY_NODE};

struct SubmissionRow {
    target_node: String,
    submitter_node: String,
    details: JobDetails,
    state: JobState,
    submission_date: chrono::DateTime<Utc>,
}

struct ResponseEntry {
    response_id: i64,
    job_id: JobId,
    submitter_node: String,
    details: ResponseDetails,
    response_date: chrono::DateTime<Utc>,
    processed: bool,
}

#[derive(Default)]
struct State {
    next_job_id: JobId,
    next_response_id: i64,
    submissions: HashMap<JobId, SubmissionRow>,
    responses: Vec<ResponseEntry>,
}

/// A single-process `JobQueue`, grounded in the teacher's
/// `InMemoryTaskDb`: one `Mutex`-guarded map plus a `Notify` standing in
/// for the metadata store's NOTIFY channels.
pub struct MemJobQueue {
    state: Mutex<State>,
    submission_notify: Notify,
    response_notify: Notify,
}

impl MemJobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            submission_notify: Notify::new(),
            response_notify: Notify::new(),
        }
    }
}

impl Default for MemJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemJobQueue {
    async fn submit(&self, target_node: &str, submitter_node: &str, details: JobDetails) -> JobQueueResult<JobId> {
        let mut state = self.state.lock().await;
        state.next_job_id += 1;
        let job_id = state.next_job_id;
        state.submissions.insert(
            job_id,
            SubmissionRow {
                target_node: target_node.to_string(),
                submitter_node: submitter_node.to_string(),
                details,
                state: JobState::New,
                submission_date: Utc::now(),
            },
        );
        drop(state);
        self.submission_notify.notify_waiters();
        Ok(job_id)
    }

    async fn claim_next(&self, node_name: &str) -> JobQueueResult<Option<ClaimedJob>> {
        let mut state = self.state.lock().await;
        let candidate = state
            .submissions
            .iter()
            .filter(|(_, row)| {
                row.state == JobState::New && (row.target_node == node_name || row.target_node == ANY_NODE)
            })
            .min_by_key(|(_, row)| row.submission_date)
            .map(|(job_id, _)| *job_id);

        let job_id = match candidate {
            Some(id) => id,
            None => return Ok(None),
        };

        let row = state.submissions.get_mut(&job_id).expect("candidate exists");
        row.state = JobState::InProgress;
        Ok(Some(ClaimedJob {
            job_id,
            submitter_node: row.submitter_node.clone(),
            details: row.details.clone(),
            submission_date: row.submission_date,
        }))
    }

    async fn complete(&self, job_id: JobId, submitter_node: &str, response: ResponseDetails) -> JobQueueResult<()> {
        let mut state = self.state.lock().await;
        state.next_response_id += 1;
        let response_id = state.next_response_id;
        state.responses.push(ResponseEntry {
            response_id,
            job_id,
            submitter_node: submitter_node.to_string(),
            details: response,
            response_date: Utc::now(),
            processed: false,
        });
        if let Some(row) = state.submissions.get_mut(&job_id) {
            row.state = JobState::Complete;
        }
        drop(state);
        self.response_notify.notify_waiters();
        Ok(())
    }

    async fn wait_for_submission(&self, timeout: Duration) -> JobQueueResult<()> {
        let _ = tokio::time::timeout(timeout, self.submission_notify.notified()).await;
        Ok(())
    }

    async fn wait_for_response(&self, _submitter_node: &str, timeout: Duration) -> JobQueueResult<()> {
        let _ = tokio::time::timeout(timeout, self.response_notify.notified()).await;
        Ok(())
    }

    async fn fetch_unprocessed_responses(&self, submitter_node: &str) -> JobQueueResult<Vec<ResponseRow>> {
        let state = self.state.lock().await;
        let mut rows: Vec<&ResponseEntry> = state
            .responses
            .iter()
            .filter(|r| !r.processed && r.submitter_node == submitter_node)
            .collect();
        rows.sort_by_key(|r| r.response_date);
        Ok(rows
            .into_iter()
            .map(|r| ResponseRow {
                response_id: r.response_id,
                job_id: r.job_id,
                details: r.details.clone(),
                response_date: r.response_date,
            })
            .collect())
    }

    async fn mark_response_processed(&self, response_id: i64) -> JobQueueResult<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.responses.iter_mut().find(|r| r.response_id == response_id) {
            entry.processed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbhub_types::JobOperation;

    fn details(op: JobOperation) -> JobDetails {
        JobDetails {
            operation: op,
            dbowner: "alice".to_string(),
            dbname: "widgets".to_string(),
            requesting_user: "alice".to_string(),
            data: None,
        }
    }

    #[tokio::test]
    async fn claim_ordering_is_fifo_per_node() {
        let queue = MemJobQueue::new();
        let a = queue.submit("n1", "sub", details(JobOperation::Size)).await.unwrap();
        let b = queue.submit("n1", "sub", details(JobOperation::Size)).await.unwrap();
        let c = queue.submit("n1", "sub", details(JobOperation::Size)).await.unwrap();

        let claimed_a = queue.claim_next("n1").await.unwrap().unwrap();
        let claimed_b = queue.claim_next("n1").await.unwrap().unwrap();
        let claimed_c = queue.claim_next("n1").await.unwrap().unwrap();

        assert_eq!(claimed_a.job_id, a);
        assert_eq!(claimed_b.job_id, b);
        assert_eq!(claimed_c.job_id, c);
    }

    #[tokio::test]
    async fn any_node_job_is_claimed_exactly_once() {
        let queue = MemJobQueue::new();
        queue.submit("any", "sub", details(JobOperation::Createdb)).await.unwrap();

        let first = queue.claim_next("n1").await.unwrap();
        let second = queue.claim_next("n2").await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn completed_response_is_fetched_and_marked_processed() {
        let queue = MemJobQueue::new();
        let job_id = queue.submit("n1", "sub", details(JobOperation::Size)).await.unwrap();
        queue.claim_next("n1").await.unwrap();
        queue
            .complete(job_id, "sub", ResponseDetails::ok(dbhub_types::job::ResponsePayload::Size { size: 42 }))
            .await
            .unwrap();

        let responses = queue.fetch_unprocessed_responses("sub").await.unwrap();
        assert_eq!(responses.len(), 1);
        queue.mark_response_processed(responses[0].response_id).await.unwrap();
        assert!(queue.fetch_unprocessed_responses("sub").await.unwrap().is_empty());
    }
}
