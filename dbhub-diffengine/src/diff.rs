//! Top-level diff entry point (§4.2): attaches two database files under
//! `main`/`aux` and runs the schema diff plus a per-table row diff.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DiffError, DiffResult};
use crate::merge::{synthesise_sql, MergeStrategy};
use crate::rowdiff::{diff_rows, full_table_diff, RowAction, RowDiff};
use crate::schema::{diff_schema, table_names, SchemaAction, SchemaChange};

/// The full result of diffing database `A` (`main`) against `B` (`aux`).
pub struct DatabaseDiff {
    pub schema_changes: Vec<SchemaChange>,
    /// Row diffs per table (§4.2 case list): a real row-by-row diff for
    /// tables unchanged in schema and common to both sides, a full-table
    /// delete for a main-only table, a full-table add for an aux-only
    /// table, and a delete-all-then-add-all pair for a table whose schema
    /// changed.
    pub table_diffs: Vec<(String, Vec<RowDiff>)>,
}

impl DatabaseDiff {
    pub fn is_empty(&self) -> bool {
        self.schema_changes.is_empty() && self.table_diffs.iter().all(|(_, rows)| rows.is_empty())
    }
}

fn attach(conn: &Connection, aux_path: &Path) -> DiffResult<()> {
    conn.execute(
        "ATTACH DATABASE ?1 AS aux",
        [aux_path.to_string_lossy().to_string()],
    )
    .map_err(|source| DiffError::AttachFailed {
        schema: "aux",
        path: aux_path.to_string_lossy().to_string(),
        source,
    })?;
    Ok(())
}

/// Diffs `main_path` (`A`) against `aux_path` (`B`).
pub fn diff(main_path: &Path, aux_path: &Path) -> DiffResult<DatabaseDiff> {
    let conn = Connection::open(main_path)?;
    attach(&conn, aux_path)?;

    let schema_changes = diff_schema(&conn)?;
    let changed_tables: std::collections::HashSet<&str> = schema_changes
        .iter()
        .filter(|c| c.kind == crate::schema::ObjectKind::Table)
        .map(|c| c.name.as_str())
        .collect();

    let main_tables = table_names(&conn, "main")?;
    let aux_tables = table_names(&conn, "aux")?;
    let common_tables: Vec<String> = main_tables
        .into_iter()
        .filter(|t| aux_tables.contains(t) && !changed_tables.contains(t.as_str()))
        .collect();

    let mut table_diffs = Vec::new();
    for change in &schema_changes {
        if change.kind != crate::schema::ObjectKind::Table {
            continue;
        }
        let rows = match change.action {
            SchemaAction::Removed => full_table_diff(&conn, "main", &change.name, RowAction::Delete)?,
            SchemaAction::Added => full_table_diff(&conn, "aux", &change.name, RowAction::Add)?,
            SchemaAction::Modified => {
                let mut rows = full_table_diff(&conn, "main", &change.name, RowAction::Delete)?;
                rows.extend(full_table_diff(&conn, "aux", &change.name, RowAction::Add)?);
                rows
            }
        };
        table_diffs.push((change.name.clone(), rows));
    }
    for table in common_tables {
        let rows = diff_rows(&conn, &table)?;
        table_diffs.push((table, rows));
    }

    Ok(DatabaseDiff {
        schema_changes,
        table_diffs,
    })
}

/// Renders every row diff in `db_diff` to merge SQL under `strategy`
/// (§4.2b), skipping tables with no PK information available (views) and
/// tables that don't exist in `main_path` itself — a main-only table's
/// delete-all diff carries no SQL (§4.2 case 1) since dropping the table
/// already accounts for its rows.
pub fn synthesise_merge_sql(
    main_path: &Path,
    db_diff: &DatabaseDiff,
    strategy: MergeStrategy,
) -> DiffResult<Vec<String>> {
    let conn = Connection::open(main_path)?;
    let existing_tables: std::collections::HashSet<String> = table_names(&conn, "main")?.into_iter().collect();
    let mut out = Vec::new();
    for (table, rows) in &db_diff.table_diffs {
        if rows.is_empty() || !existing_tables.contains(table) {
            continue;
        }
        let pk_cols = crate::rowdiff::pk_columns(&conn, "main", table)?;
        let other_cols = crate::rowdiff::other_columns(&conn, "main", table, &pk_cols)?;
        for row in rows {
            if let Some(sql) = synthesise_sql(&conn, table, &pk_cols, &other_cols, row, strategy)? {
                out.push(sql);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection as RawConnection;
    use tempfile::tempdir;

    fn file_db(dir: &tempfile::TempDir, name: &str, sql: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let conn = RawConnection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        path
    }

    #[test]
    fn diff_of_identical_databases_is_empty() {
        let dir = tempdir().unwrap();
        let a = file_db(&dir, "a.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)");
        let b = file_db(&dir, "b.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)");
        let result = diff(&a, &b).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn diff_add_row_scenario() {
        let dir = tempdir().unwrap();
        let a = file_db(&dir, "a.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)");
        let b = file_db(
            &dir,
            "b.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
        );
        let result = diff(&a, &b).unwrap();
        assert_eq!(result.table_diffs.len(), 1);
        assert_eq!(result.table_diffs[0].1.len(), 1);

        let sql = synthesise_merge_sql(&a, &result, MergeStrategy::NewPkMerge).unwrap();
        assert_eq!(sql, vec!["INSERT INTO \"t\"(\"name\") VALUES ('x');".to_string()]);
    }

    #[test]
    fn aux_only_table_gets_a_full_insert_diff() {
        let dir = tempdir().unwrap();
        let a = file_db(&dir, "a.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY)");
        let b = file_db(
            &dir,
            "b.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY); \
             CREATE TABLE extra(id INTEGER PRIMARY KEY, label TEXT); \
             INSERT INTO extra VALUES (1, 'x'), (2, 'y')",
        );
        let result = diff(&a, &b).unwrap();
        let (_, rows) = result.table_diffs.iter().find(|(t, _)| t == "extra").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.action == crate::rowdiff::RowAction::Add));

        let sql = synthesise_merge_sql(&b, &result, MergeStrategy::PreservePkMerge).unwrap();
        assert_eq!(sql.len(), 2);
    }

    #[test]
    fn main_only_table_gets_a_full_delete_diff_with_no_merge_sql() {
        let dir = tempdir().unwrap();
        let a = file_db(
            &dir,
            "a.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY); \
             CREATE TABLE gone(id INTEGER PRIMARY KEY, label TEXT); \
             INSERT INTO gone VALUES (1, 'x')",
        );
        let b = file_db(&dir, "b.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY)");
        let result = diff(&a, &b).unwrap();
        let (_, rows) = result.table_diffs.iter().find(|(t, _)| t == "gone").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, crate::rowdiff::RowAction::Delete);

        // `main_path = b` here stands in for "the side that no longer has
        // the table" (§4.2 case 1): its delete-all diff carries no SQL.
        let sql = synthesise_merge_sql(&b, &result, MergeStrategy::PreservePkMerge).unwrap();
        assert!(sql.is_empty());
    }

    #[test]
    fn modified_schema_table_gets_delete_all_then_add_all() {
        let dir = tempdir().unwrap();
        let a = file_db(
            &dir,
            "a.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); INSERT INTO t VALUES (1, 'x')",
        );
        let b = file_db(
            &dir,
            "b.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT, extra INTEGER); INSERT INTO t VALUES (1, 'x', 9)",
        );
        let result = diff(&a, &b).unwrap();
        let (_, rows) = result.table_diffs.iter().find(|(t, _)| t == "t").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].action, crate::rowdiff::RowAction::Delete);
        assert_eq!(rows[1].action, crate::rowdiff::RowAction::Add);
    }

    proptest::proptest! {
        // Idempotence (§8): diff(A, A, *) is the empty changeset for any
        // set of integer rows inserted into an identical schema on both sides.
        #[test]
        fn diffing_a_database_against_itself_is_empty(rows in proptest::collection::vec(0i64..1000, 0..20)) {
            let dir = tempdir().unwrap();
            let insert_sql: String = rows
                .iter()
                .enumerate()
                .map(|(id, v)| format!("INSERT INTO t VALUES ({id}, {v});"))
                .collect();
            let sql = format!(
                "CREATE TABLE t(id INTEGER PRIMARY KEY, v INTEGER); {insert_sql}"
            );
            let a = file_db(&dir, "a.sqlite", &sql);
            let b = file_db(&dir, "b.sqlite", &sql);
            let result = diff(&a, &b).unwrap();
            prop_assert!(result.is_empty());
        }
    }
}
