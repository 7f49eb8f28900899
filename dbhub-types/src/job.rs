//! Job/response wire types (§6 "External interfaces").
//!
//! These are the JSON shapes placed into `job_submissions.details` and
//! `job_responses.details`. The job queue crate treats `details` as an
//! opaque JSON blob; this crate is where its shape is actually pinned down
//! so the dispatch API (C6) and the live-node runtime (C3) agree on it
//! without depending on each other.

use serde::{Deserialize, Serialize};

/// Database-assigned identifier of a job row.
pub type JobId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOperation {
    Createdb,
    Delete,
    Query,
    Execute,
    Tables,
    Views,
    Indexes,
    Columns,
    #[serde(rename = "rowdata")]
    RowData,
    Size,
    Backup,
}

impl std::fmt::Display for JobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        write!(f, "{s}")
    }
}

/// The job submission payload (`job_submissions.details`, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetails {
    pub operation: JobOperation,
    pub dbowner: String,
    pub dbname: String,
    pub requesting_user: String,
    /// Operation-dependent. A SQL string for `query`/`execute`, a blob
    /// object id for `createdb`, a table name for `columns`/`indexes`,
    /// base64(JSON) for `rowdata` (§4.6), or absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The payload carried (base64-then-JSON, §4.6) inside a `rowdata` job's
/// `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowDataParams {
    pub db_table: String,
    pub sort_col: Option<String>,
    pub sort_dir: Option<SortDir>,
    pub commit_id: Option<String>,
    pub row_offset: u32,
    pub max_rows: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDir {
    Asc,
    Desc,
}

/// Typed codes for the `JobQueueError` error kind (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobQueueErrorCode {
    NoError,
    RequestedTableNotPresent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexColumn {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub table: String,
    pub columns: Vec<IndexColumn>,
}

/// Operation-specific success fields (§6). Untagged: callers match on which
/// fields are present, exactly as a front-end decoding this JSON would.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Query {
        results: serde_json::Value,
    },
    Execute {
        rows_changed: u64,
    },
    CreateDb {
        node_name: String,
    },
    Size {
        size: u64,
    },
    Indexes {
        indexes: Vec<IndexInfo>,
    },
    RowData {
        row_data: serde_json::Value,
        database_size: u64,
        default_table: String,
        tables: Vec<String>,
    },
    Tables {
        tables: Vec<String>,
    },
    Empty {},
}

/// The job response payload (`job_responses.details`, §6). Every response
/// carries an `error` string, empty on success (§7 propagation rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDetails {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<JobQueueErrorCode>,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl ResponseDetails {
    pub fn ok(payload: ResponsePayload) -> Self {
        Self {
            error: String::new(),
            error_code: None,
            payload,
        }
    }

    pub fn err(message: impl Into<String>, code: JobQueueErrorCode) -> Self {
        Self {
            error: message.into(),
            error_code: Some(code),
            payload: ResponsePayload::Empty {},
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rowdata_operation_serializes_without_underscore() {
        let v = serde_json::to_value(JobOperation::RowData).unwrap();
        assert_eq!(v, serde_json::json!("rowdata"));
    }

    #[test]
    fn job_details_round_trips_through_json() {
        let details = JobDetails {
            operation: JobOperation::Query,
            dbowner: "alice".to_string(),
            dbname: "data.sqlite".to_string(),
            requesting_user: "alice".to_string(),
            data: Some(serde_json::json!("SELECT 1")),
        };
        let s = serde_json::to_string(&details).unwrap();
        let back: JobDetails = serde_json::from_str(&s).unwrap();
        assert_eq!(back.dbowner, "alice");
        assert!(matches!(back.operation, JobOperation::Query));
    }

    #[test]
    fn response_details_success_has_empty_error() {
        let resp = ResponseDetails::ok(ResponsePayload::Execute { rows_changed: 3 });
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["error"], serde_json::json!(""));
        assert_eq!(v["rows_changed"], serde_json::json!(3));
        assert!(!resp.is_error());
    }

    #[test]
    fn response_details_error_carries_code() {
        let resp = ResponseDetails::err("no such table", JobQueueErrorCode::RequestedTableNotPresent);
        assert!(resp.is_error());
        assert_eq!(resp.error_code, Some(JobQueueErrorCode::RequestedTableNotPresent));
    }
}
