//! Postgres-backed `JobQueue` (§4.4). One `PgListener` per process is
//! reserved for `LISTEN`/`WaitForNotification` on both channels; a separate
//! `PgPool` handles INSERT/SELECT/UPDATE, per §4.4's "one connection per
//! process... a separate pool is used for INSERT/SELECT/UPDATE".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbhub_types::{JobDetails, JobId, ResponseDetails};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::error::JobQueueResult;
use crate::queue::JobQueue;
use crate::types::{ClaimedJob, JobState, ResponseRow, ANY_NODE};

pub struct PgJobQueue {
    pool: PgPool,
    submissions_listener: Arc<Mutex<PgListener>>,
    responses_listener: Arc<Mutex<PgListener>>,
}

impl PgJobQueue {
    pub async fn connect(pool: PgPool) -> JobQueueResult<Self> {
        let mut submissions_listener = PgListener::connect_with(&pool).await?;
        submissions_listener.listen("job_submissions_queue").await?;

        let mut responses_listener = PgListener::connect_with(&pool).await?;
        responses_listener.listen("job_responses_queue").await?;

        Ok(Self {
            pool,
            submissions_listener: Arc::new(Mutex::new(submissions_listener)),
            responses_listener: Arc::new(Mutex::new(responses_listener)),
        })
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn submit(&self, target_node: &str, submitter_node: &str, details: JobDetails) -> JobQueueResult<JobId> {
        let payload = serde_json::to_value(&details)?;
        let row: (JobId,) = sqlx::query_as(
            "INSERT INTO job_submissions(target_node, submitter_node, state, details, submission_date) \
             VALUES ($1, $2, $3, $4, now()) RETURNING job_id",
        )
        .bind(target_node)
        .bind(submitter_node)
        .bind(JobState::New.as_sql())
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn claim_next(&self, node_name: &str) -> JobQueueResult<Option<ClaimedJob>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(JobId, String, serde_json::Value, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT job_id, submitter_node, details, submission_date FROM job_submissions \
             WHERE state = 'new' AND (target_node = $1 OR target_node = $2) \
             AND completed_date IS NULL \
             ORDER BY submission_date \
             FOR UPDATE SKIP LOCKED \
             LIMIT 1",
        )
        .bind(node_name)
        .bind(ANY_NODE)
        .fetch_optional(&mut *tx)
        .await?;

        let (job_id, submitter_node, details, submission_date) = match row {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        sqlx::query("UPDATE job_submissions SET state = 'in_progress' WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let details: JobDetails = serde_json::from_value(details)?;
        Ok(Some(ClaimedJob {
            job_id,
            submitter_node,
            details,
            submission_date,
        }))
    }

    async fn complete(&self, job_id: JobId, submitter_node: &str, response: ResponseDetails) -> JobQueueResult<()> {
        let payload = serde_json::to_value(&response)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO job_responses(job_id, submitter_node, details, response_date) \
             VALUES ($1, $2, $3, now())",
        )
        .bind(job_id)
        .bind(submitter_node)
        .bind(payload)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE job_submissions SET state = 'complete', completed_date = now() WHERE job_id = $1",
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn wait_for_submission(&self, timeout: Duration) -> JobQueueResult<()> {
        let mut listener = self.submissions_listener.lock().await;
        let _ = tokio::time::timeout(timeout, listener.recv()).await;
        Ok(())
    }

    async fn wait_for_response(&self, submitter_node: &str, timeout: Duration) -> JobQueueResult<()> {
        let mut listener = self.responses_listener.lock().await;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            match tokio::time::timeout(remaining, listener.recv()).await {
                Ok(Ok(notification)) if notification.payload() == submitter_node => return Ok(()),
                Ok(Ok(_)) => continue,
                _ => return Ok(()),
            }
        }
    }

    async fn fetch_unprocessed_responses(&self, submitter_node: &str) -> JobQueueResult<Vec<ResponseRow>> {
        let rows: Vec<(i64, JobId, serde_json::Value, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT response_id, job_id, details, response_date FROM job_responses \
             WHERE processed_date IS NULL AND submitter_node = $1 \
             ORDER BY response_date",
        )
        .bind(submitter_node)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(response_id, job_id, details, response_date)| {
                Ok(ResponseRow {
                    response_id,
                    job_id,
                    details: serde_json::from_value(details)?,
                    response_date,
                })
            })
            .collect()
    }

    async fn mark_response_processed(&self, response_id: i64) -> JobQueueResult<()> {
        sqlx::query("UPDATE job_responses SET processed_date = now() WHERE response_id = $1")
            .bind(response_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
