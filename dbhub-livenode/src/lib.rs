//! Live-node runtime (§4.3): owns a node's local live databases, claims
//! jobs addressed to it (§4.4), dispatches them against a sandboxed session
//! (C1) or the diff engine (C2), and writes the response row.

pub mod blobstore;
pub mod claim_loop;
pub mod config;
pub mod error;
pub mod handlers;
pub mod storage;

pub use blobstore::{BlobStore, FsBlobStore};
pub use claim_loop::run_claim_loop;
pub use config::LiveNodeConfig;
pub use error::{LiveNodeError, LiveNodeResult};
pub use handlers::dispatch;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dbhub_jobqueue::{JobQueue, MemJobQueue, SubmitterInstance, ANY_NODE};
    use dbhub_metadata::{InMemoryMetadataStore, MetadataStore};
    use dbhub_types::job::{JobDetails, JobOperation, ResponsePayload};
    use tokio::sync::watch;

    use super::*;

    fn config(storage: &std::path::Path, blobs: &std::path::Path) -> LiveNodeConfig {
        LiveNodeConfig {
            node_name: "node-a".to_string(),
            storage_dir: storage.to_path_buf(),
            blob_dir: blobs.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_query_and_delete_round_trip_through_the_claim_loop() {
        let storage = tempfile::tempdir().unwrap();
        let blobs = tempfile::tempdir().unwrap();
        let cfg = Arc::new(config(storage.path(), blobs.path()));
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(blobs.path()));
        let queue: Arc<dyn JobQueue> = Arc::new(MemJobQueue::new());
        let metadata: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());

        let seed_db = storage.path().join("seed.sqlite");
        {
            let conn = rusqlite::Connection::open(&seed_db).unwrap();
            conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); INSERT INTO t(v) VALUES ('x')")
                .unwrap();
        }
        let bytes = std::fs::read(&seed_db).unwrap();
        let sha256 = blobstore::sha256_hex_of_file(&seed_db).unwrap();
        blob_store.put(&sha256, bytes).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let loop_handle = tokio::spawn(run_claim_loop(
            cfg.clone(),
            queue.clone(),
            blob_store.clone(),
            metadata.clone(),
            rx,
        ));

        let submitter = SubmitterInstance::generate();
        let job_id = queue
            .submit(
                ANY_NODE,
                &submitter.0,
                JobDetails {
                    operation: JobOperation::Createdb,
                    dbowner: "alice".to_string(),
                    dbname: "notes".to_string(),
                    requesting_user: "alice".to_string(),
                    data: Some(serde_json::Value::String(sha256)),
                },
            )
            .await
            .unwrap();

        let response = wait_for_response(queue.as_ref(), &submitter.0, job_id).await;
        assert!(!response.is_error());
        match response.payload {
            ResponsePayload::CreateDb { node_name } => assert_eq!(node_name, "node-a"),
            other => panic!("unexpected payload: {other:?}"),
        }

        let job_id = queue
            .submit(
                "node-a",
                &submitter.0,
                JobDetails {
                    operation: JobOperation::Tables,
                    dbowner: "alice".to_string(),
                    dbname: "notes".to_string(),
                    requesting_user: "alice".to_string(),
                    data: None,
                },
            )
            .await
            .unwrap();
        let response = wait_for_response(queue.as_ref(), &submitter.0, job_id).await;
        match response.payload {
            ResponsePayload::Tables { tables } => assert_eq!(tables, vec!["t".to_string()]),
            other => panic!("unexpected payload: {other:?}"),
        }

        loop_handle.abort();
    }

    async fn wait_for_response(
        queue: &dyn JobQueue,
        submitter_node: &str,
        job_id: dbhub_types::JobId,
    ) -> dbhub_types::ResponseDetails {
        for _ in 0..200 {
            let rows = queue.fetch_unprocessed_responses(submitter_node).await.unwrap();
            if let Some(row) = rows.into_iter().find(|r| r.job_id == job_id) {
                queue.mark_response_processed(row.response_id).await.unwrap();
                return row.details;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for response to job {job_id}");
    }
}
