//! Response checker loop (§4.5): on a `job_responses_queue` notification
//! matching this process's `SubmitterInstance`, drains unprocessed response
//! rows, hands each to the [`ResponseMultiplexer`], then marks it processed
//! regardless of whether a receiver was found.

use std::sync::Arc;
use std::time::Duration;

use dbhub_jobqueue::JobQueue;
use tracing::{debug, warn};

use crate::multiplexer::ResponseMultiplexer;

/// The interval used while polling `wait_for_response` in a loop; NOTIFY
/// payloads can also arrive faster than this and are not missed since each
/// iteration re-queries for unprocessed rows rather than trusting the
/// notification alone.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs until `shutdown` resolves. Intended to be spawned once per process
/// as a `tokio::task`, mirroring the teacher's `Actor::serve_in_background`
/// long-running-task shape.
pub async fn run_response_checker(
    queue: Arc<dyn JobQueue>,
    mux: ResponseMultiplexer,
    submitter_node: String,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = queue.wait_for_response(&submitter_node, POLL_TIMEOUT) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }

        let rows = match queue.fetch_unprocessed_responses(&submitter_node).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "failed to fetch unprocessed responses");
                continue;
            }
        };

        for row in rows {
            debug!(job_id = row.job_id, response_id = row.response_id, "delivering response");
            mux.deliver(row.job_id, row.details).await;
            if let Err(e) = queue.mark_response_processed(row.response_id).await {
                warn!(response_id = row.response_id, error = %e, "failed to mark response processed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbhub_jobqueue::MemJobQueue;
    use dbhub_types::job::ResponsePayload;
    use dbhub_types::{JobDetails, JobOperation, ResponseDetails};

    #[tokio::test]
    async fn checker_delivers_response_to_waiting_receiver() {
        let queue: Arc<dyn JobQueue> = Arc::new(MemJobQueue::new());
        let mux = ResponseMultiplexer::new();
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let job_id = queue
            .submit(
                "n1",
                "sub",
                JobDetails {
                    operation: JobOperation::Size,
                    dbowner: "alice".to_string(),
                    dbname: "widgets".to_string(),
                    requesting_user: "alice".to_string(),
                    data: None,
                },
            )
            .await
            .unwrap();
        let rx = mux.add_receiver(job_id).await;

        let checker_queue = queue.clone();
        let checker_mux = mux.clone();
        let handle = tokio::spawn(run_response_checker(
            checker_queue,
            checker_mux,
            "sub".to_string(),
            shutdown_rx,
        ));
        tokio::task::yield_now().await;

        queue.claim_next("n1").await.unwrap();
        queue
            .complete(job_id, "sub", ResponseDetails::ok(ResponsePayload::Size { size: 7 }))
            .await
            .unwrap();

        let details = mux
            .wait_for_response(job_id, rx, Duration::from_secs(2))
            .await
            .unwrap();
        match details.payload {
            ResponsePayload::Size { size } => assert_eq!(size, 7),
            _ => panic!("wrong payload"),
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
