//! Sandboxed SQLite session handling (§4.1): opening defensive/live
//! connections with hardened pragmas, resource limits and an authorizer,
//! plus the key read operations run against them.

pub mod authorizer;
pub mod error;
pub mod escape;
pub mod limits;
pub mod query;
pub mod session;

pub use error::{SessionError, SessionResult};
pub use escape::{quote_identifier, quote_value, SqlValue};
pub use query::{
    primary_key_and_other_columns, read_sqlite_db_cols, sqlite_run_query, tables, tables_and_views,
    views, PrimaryKey, QueryStats, ReadColsOptions, RenderSource, RenderedCell, RowPage, SortDir,
};
pub use session::{Session, SessionMode};
