//! Value types crossing the [`crate::store::MetadataStore`] boundary.

use chrono::{DateTime, Utc};
use dbhub_types::Access;
use serde::{Deserialize, Serialize};

/// A live DB's location record (§4.3, §4.7 supplementary `GetLiveDB`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveDbRecord {
    pub owner: String,
    pub name: String,
    pub node_name: String,
    pub access: Access,
    pub last_modified: DateTime<Utc>,
}

/// Resolved blob address plus freshness, returned by `MinioLocation`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlobLocation {
    pub bucket: String,
    pub object: String,
    pub last_modified: DateTime<Utc>,
}

/// A usage-log bracket id returned by `LogSQLiteQueryBefore`.
pub type QueryLogId = i64;
