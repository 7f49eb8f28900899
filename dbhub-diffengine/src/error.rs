//! Error taxonomy for the diff/merge engine (§7 realized for C2).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("failed to attach {path} as {schema}: {source}")]
    AttachFailed {
        schema: &'static str,
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema introspection failed: {0}")]
    SchemaIntrospection(#[source] rusqlite::Error),

    #[error("row diff query failed for table {table}: {source}")]
    RowDiffQuery {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("unsupported object type {0:?} in schema diff")]
    UnsupportedObjectType(String),

    #[error("three-way merge is not implemented for non-fast-forward merges with data changes")]
    MergeNotImplemented,

    #[error("failed to copy destination file for merge: {0}")]
    Io(#[from] std::io::Error),

    #[error("merge conflicts on {0} object(s)")]
    MergeConflicts(usize),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type DiffResult<T> = Result<T, DiffError>;
