//! The live-node claim loop (§4.4): `on NOTIFY job_submissions_queue ...`,
//! driven here by [`JobQueue::wait_for_submission`]/[`JobQueue::claim_next`]
//! rather than a raw LISTEN connection, so the loop is identical whether
//! it's backed by Postgres or the in-memory fake.

use std::sync::Arc;
use std::time::Duration;

use dbhub_jobqueue::JobQueue;
use dbhub_metadata::MetadataStore;
use dbhub_types::job::ResponseDetails;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::blobstore::BlobStore;
use crate::config::LiveNodeConfig;
use crate::handlers::dispatch;

/// §4.4 "on NOTIFY job_submissions_queue...": poll every `poll_interval` if
/// no notification arrives, since the in-memory fake and a real
/// `PgListener` both honor `wait_for_submission`'s timeout the same way.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run_claim_loop(
    config: Arc<LiveNodeConfig>,
    queue: Arc<dyn JobQueue>,
    blob_store: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(node = %config.node_name, "claim loop started");
    loop {
        tokio::select! {
            _ = queue.wait_for_submission(POLL_INTERVAL) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("claim loop shutting down");
                    return;
                }
            }
        }

        loop {
            let claimed = match queue.claim_next(&config.node_name).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "claim_next failed");
                    break;
                }
            };

            let job_id = claimed.job_id;
            let response = match dispatch(&config, blob_store.as_ref(), metadata.as_ref(), claimed.details).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(job_id, error = %e, "job dispatch failed");
                    ResponseDetails::err(e.to_string(), e.code())
                }
            };

            if let Err(e) = queue.complete(job_id, &claimed.submitter_node, response).await {
                error!(job_id, error = %e, "failed to record job completion");
            }
        }
    }
}
