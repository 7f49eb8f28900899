//! Error taxonomy for the sandboxed session (§7 realized for C1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("limit {limit} did not apply: requested {requested}, actual {actual}")]
    LimitNotApplied {
        limit: &'static str,
        requested: i32,
        actual: i32,
    },

    #[error("pragma {pragma} did not apply")]
    PragmaNotApplied { pragma: &'static str },

    #[error("authorizer denied action: {action}")]
    AuthorizerDenied { action: String },

    #[error("no primary key and no usable rowid alias for table {table}")]
    NoUsablePrimaryKey { table: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
