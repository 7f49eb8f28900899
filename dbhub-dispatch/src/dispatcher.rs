//! Dispatch API (§4.6): thin typed wrappers over the job queue (C4) and
//! response multiplexer (C5), grounded in the teacher's `reqactor::Actor`
//! methods — validate input, marshal `details`, submit, await response,
//! decode into a typed struct.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use dbhub_jobqueue::{JobQueue, SubmitterInstance, ANY_NODE};
use dbhub_metadata::MetadataStore;
use dbhub_responsemux::ResponseMultiplexer;
use dbhub_types::job::{IndexInfo, JobQueueErrorCode, ResponsePayload, RowDataParams, SortDir};
use dbhub_types::{Access, JobDetails, JobOperation, ResponseDetails};

use crate::error::{DispatchError, DispatchResult};
use crate::validate;

/// Everything a dispatch call needs: where to submit, how to wait for the
/// answer, and the metadata DAO for the one post-`execute` side effect
/// (§4.6 "On successful `execute`, the dispatcher calls `UpdateModified`").
pub struct Dispatcher {
    queue: Arc<dyn JobQueue>,
    mux: ResponseMultiplexer,
    metadata: Arc<dyn MetadataStore>,
    submitter: SubmitterInstance,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        mux: ResponseMultiplexer,
        metadata: Arc<dyn MetadataStore>,
        submitter: SubmitterInstance,
    ) -> Self {
        Self {
            queue,
            mux,
            metadata,
            submitter,
        }
    }

    async fn submit_and_wait(
        &self,
        target_node: &str,
        details: JobDetails,
        deadline: Duration,
    ) -> DispatchResult<ResponseDetails> {
        let job_id = self.queue.submit(target_node, &self.submitter.0, details).await?;
        let rx = self.mux.add_receiver(job_id).await;
        let response = self.mux.wait_for_response(job_id, rx, deadline).await?;
        if response.is_error() {
            return Err(DispatchError::JobQueueError {
                message: response.error.clone(),
                code: response.error_code.unwrap_or(JobQueueErrorCode::NoError),
            });
        }
        Ok(response)
    }

    fn details(
        &self,
        operation: JobOperation,
        dbowner: &str,
        dbname: &str,
        requesting_user: &str,
        data: Option<serde_json::Value>,
    ) -> DispatchResult<JobDetails> {
        validate::owner_or_db_name(dbowner)?;
        validate::owner_or_db_name(dbname)?;
        Ok(JobDetails {
            operation,
            dbowner: dbowner.to_string(),
            dbname: dbname.to_string(),
            requesting_user: requesting_user.to_string(),
            data,
        })
    }

    pub async fn query(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        sql: &str,
        deadline: Duration,
    ) -> DispatchResult<serde_json::Value> {
        let details = self.details(
            JobOperation::Query,
            owner,
            name,
            user,
            Some(serde_json::Value::String(sql.to_string())),
        )?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::Query { results } => Ok(results),
            other => Err(unexpected_payload("query", &other)),
        }
    }

    pub async fn execute(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        sql: &str,
        deadline: Duration,
    ) -> DispatchResult<u64> {
        let details = self.details(
            JobOperation::Execute,
            owner,
            name,
            user,
            Some(serde_json::Value::String(sql.to_string())),
        )?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        let rows_changed = match response.payload {
            ResponsePayload::Execute { rows_changed } => rows_changed,
            other => return Err(unexpected_payload("execute", &other)),
        };
        self.metadata.update_modified(owner, name).await?;
        Ok(rows_changed)
    }

    pub async fn tables(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        deadline: Duration,
    ) -> DispatchResult<Vec<String>> {
        let details = self.details(JobOperation::Tables, owner, name, user, None)?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::Tables { tables } => Ok(tables),
            other => Err(unexpected_payload("tables", &other)),
        }
    }

    pub async fn views(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        deadline: Duration,
    ) -> DispatchResult<Vec<String>> {
        let details = self.details(JobOperation::Views, owner, name, user, None)?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::Tables { tables } => Ok(tables),
            other => Err(unexpected_payload("views", &other)),
        }
    }

    pub async fn columns(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        table: &str,
        deadline: Duration,
    ) -> DispatchResult<Vec<String>> {
        let details = self.details(
            JobOperation::Columns,
            owner,
            name,
            user,
            Some(serde_json::Value::String(table.to_string())),
        )?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::Tables { tables } => Ok(tables),
            other => Err(unexpected_payload("columns", &other)),
        }
    }

    pub async fn indexes(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        table: Option<&str>,
        deadline: Duration,
    ) -> DispatchResult<Vec<IndexInfo>> {
        let data = table.map(|t| serde_json::Value::String(t.to_string()));
        let details = self.details(JobOperation::Indexes, owner, name, user, data)?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::Indexes { indexes } => Ok(indexes),
            other => Err(unexpected_payload("indexes", &other)),
        }
    }

    pub async fn size(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        deadline: Duration,
    ) -> DispatchResult<u64> {
        let details = self.details(JobOperation::Size, owner, name, user, None)?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::Size { size } => Ok(size),
            other => Err(unexpected_payload("size", &other)),
        }
    }

    /// `createdb` always targets the `"any"` sentinel node (§4.3, §4.4).
    pub async fn create_db(
        &self,
        owner: &str,
        name: &str,
        user: &str,
        blob_id: &str,
        access: Access,
        deadline: Duration,
    ) -> DispatchResult<String> {
        let details = self.details(
            JobOperation::Createdb,
            owner,
            name,
            user,
            Some(serde_json::Value::String(blob_id.to_string())),
        )?;
        let response = self.submit_and_wait(ANY_NODE, details, deadline).await?;
        let node_name = match response.payload {
            ResponsePayload::CreateDb { node_name } => node_name,
            other => return Err(unexpected_payload("createdb", &other)),
        };
        self.metadata
            .live_add_database_pg(owner, name, blob_id, &node_name, access)
            .await?;
        Ok(node_name)
    }

    pub async fn delete(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        deadline: Duration,
    ) -> DispatchResult<()> {
        let details = self.details(JobOperation::Delete, owner, name, user, None)?;
        self.submit_and_wait(node, details, deadline).await?;
        self.metadata.delete_live_db(owner, name).await?;
        Ok(())
    }

    pub async fn backup(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        deadline: Duration,
    ) -> DispatchResult<()> {
        let details = self.details(JobOperation::Backup, owner, name, user, None)?;
        self.submit_and_wait(node, details, deadline).await?;
        Ok(())
    }

    /// `rowdata` (§4.6): the payload is JSON-encoded then base64-encoded
    /// into `details.data` to sidestep a transport peculiarity of the
    /// metadata store's JSON column for nested objects (§9).
    #[allow(clippy::too_many_arguments)]
    pub async fn row_data(
        &self,
        node: &str,
        owner: &str,
        name: &str,
        user: &str,
        table: &str,
        sort_col: Option<&str>,
        sort_dir: Option<SortDir>,
        commit_id: Option<&str>,
        row_offset: u32,
        max_rows: u32,
        deadline: Duration,
    ) -> DispatchResult<(serde_json::Value, u64, String, Vec<String>)> {
        if let Some(id) = commit_id {
            validate::commit_id(id)?;
        }
        let params = RowDataParams {
            db_table: table.to_string(),
            sort_col: sort_col.map(str::to_string),
            sort_dir,
            commit_id: commit_id.map(str::to_string),
            row_offset,
            max_rows,
        };
        let encoded = general_purpose::STANDARD.encode(
            serde_json::to_vec(&params).map_err(|e| DispatchError::Validation(e.to_string()))?,
        );
        let details = self.details(
            JobOperation::RowData,
            owner,
            name,
            user,
            Some(serde_json::Value::String(encoded)),
        )?;
        let response = self.submit_and_wait(node, details, deadline).await?;
        match response.payload {
            ResponsePayload::RowData {
                row_data,
                database_size,
                default_table,
                tables,
            } => Ok((row_data, database_size, default_table, tables)),
            other => Err(unexpected_payload("rowdata", &other)),
        }
    }
}

fn unexpected_payload(op: &str, payload: &ResponsePayload) -> DispatchError {
    DispatchError::Transient(format!("{op} response carried an unexpected payload: {payload:?}"))
}
