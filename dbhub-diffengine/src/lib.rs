//! Diff/merge engine (§4.2): schema and row diffing between two SQLite
//! files, SQL synthesis under three merge strategies, and three-way merge.

pub mod diff;
pub mod error;
pub mod merge;
pub mod rowdiff;
pub mod schema;
pub mod threeway;

pub use diff::{diff, synthesise_merge_sql, DatabaseDiff};
pub use error::{DiffError, DiffResult};
pub use merge::{has_autoincrement_pk, synthesise_sql, MergeStrategy};
pub use rowdiff::{diff_rows, RowAction, RowDiff};
pub use schema::{diff_schema, table_names, ObjectKind, SchemaAction, SchemaChange};
pub use threeway::{is_fast_forward, three_way_merge, MergeConflict, MergeOutcome};
