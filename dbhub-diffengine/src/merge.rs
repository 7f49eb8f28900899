//! Merge-SQL synthesis (§4.2b): turns a [`RowDiff`] into an executable SQL
//! statement under one of three strategies.

use dbhub_sqlite_session::escape::{quote_identifier, quote_value, SqlValue};
use rusqlite::Connection;

use crate::error::{DiffError, DiffResult};
use crate::rowdiff::{RowAction, RowDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Emit no SQL; diff rows carry only action + PK (+ optionally full row).
    NoMerge,
    /// INSERTs include the PK columns verbatim; UPDATE/DELETE reference PK
    /// in the WHERE clause, using `IS NULL` for null key fields.
    PreservePkMerge,
    /// For tables with an auto-incrementing integer PK, omit the PK column
    /// from INSERT; otherwise synthesise a new PK via `max(pk)+1`.
    NewPkMerge,
}

/// A synthesised SQL statement for one row diff, `None` under `NoMerge`.
pub type MergeSql = Option<String>;

/// Detects whether `table` has "an incrementing int PK": exactly one PK
/// column, declared `INTEGER`, and the table is not `WITHOUT ROWID`.
pub fn has_autoincrement_pk(conn: &Connection, schema: &str, table: &str) -> DiffResult<bool> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(schema),
        quote_identifier(table)
    );
    let mut stmt = conn.prepare(&sql).map_err(DiffError::SchemaIntrospection)?;
    let cols: Vec<(String, String, i64)> = stmt
        .query_map([], |row| {
            Ok((row.get("name")?, row.get("type")?, row.get("pk")?))
        })
        .map_err(DiffError::SchemaIntrospection)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DiffError::SchemaIntrospection)?;

    let pk_cols: Vec<&(String, String, i64)> = cols.iter().filter(|(_, _, pk)| *pk > 0).collect();
    if pk_cols.len() != 1 {
        return Ok(false);
    }
    if !pk_cols[0].1.eq_ignore_ascii_case("integer") {
        return Ok(false);
    }

    let sql_text: Option<String> = conn
        .query_row(
            &format!(
                "SELECT sql FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
                quote_identifier(schema)
            ),
            [table],
            |row| row.get(0),
        )
        .map_err(DiffError::SchemaIntrospection)?;
    let without_rowid = sql_text
        .map(|s| s.to_ascii_uppercase().ends_with("WITHOUT ROWID"))
        .unwrap_or(false);
    Ok(!without_rowid)
}

fn pk_where_clause(pk_cols: &[String], pk_values: &[SqlValue]) -> String {
    pk_cols
        .iter()
        .zip(pk_values.iter())
        .map(|(col, val)| {
            let q = quote_identifier(col);
            match val {
                SqlValue::Null => format!("{q} IS NULL"),
                other => format!("{q} = {}", quote_value(other)),
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Synthesises the SQL for one [`RowDiff`] against `table` under `strategy`.
/// `other_cols` must be in the same order as `diff.old`/`diff.new`.
pub fn synthesise_sql(
    conn: &Connection,
    table: &str,
    pk_cols: &[String],
    other_cols: &[String],
    diff: &RowDiff,
    strategy: MergeStrategy,
) -> DiffResult<MergeSql> {
    if strategy == MergeStrategy::NoMerge {
        return Ok(None);
    }

    let quoted_table = quote_identifier(table);

    match diff.action {
        RowAction::Add => {
            let new = diff.new.as_ref().expect("add diff always carries new values");
            let auto_pk = strategy == MergeStrategy::NewPkMerge
                && has_autoincrement_pk(conn, "main", table)?;

            let (cols, values): (Vec<String>, Vec<String>) = if auto_pk {
                (
                    other_cols.iter().map(|c| quote_identifier(c)).collect(),
                    new.iter().map(quote_value).collect(),
                )
            } else if strategy == MergeStrategy::NewPkMerge {
                // Non-autoincrement PK under NewPkMerge: synthesise a fresh
                // first-PK value via a max()+1 subquery; remaining PK
                // columns (composite keys) keep their diffed value.
                let mut cols = vec![quote_identifier(&pk_cols[0])];
                let mut values = vec![format!(
                    "(SELECT COALESCE(max({}), 0) + 1 FROM {})",
                    quote_identifier(&pk_cols[0]),
                    quoted_table
                )];
                for col in &pk_cols[1..] {
                    cols.push(quote_identifier(col));
                    let idx = pk_cols.iter().position(|c| c == col).unwrap();
                    values.push(quote_value(&diff.pk[idx]));
                }
                cols.extend(other_cols.iter().map(|c| quote_identifier(c)));
                values.extend(new.iter().map(quote_value));
                (cols, values)
            } else {
                // PreservePkMerge: PK columns verbatim.
                let mut cols: Vec<String> = pk_cols.iter().map(|c| quote_identifier(c)).collect();
                let mut values: Vec<String> = diff.pk.iter().map(quote_value).collect();
                cols.extend(other_cols.iter().map(|c| quote_identifier(c)));
                values.extend(new.iter().map(quote_value));
                (cols, values)
            };

            Ok(Some(format!(
                "INSERT INTO {quoted_table}({}) VALUES ({});",
                cols.join(", "),
                values.join(", ")
            )))
        }

        RowAction::Modify => {
            let old = diff.old.as_ref().expect("modify diff always carries old values");
            let new = diff.new.as_ref().expect("modify diff always carries new values");
            let mut sets = Vec::new();
            for ((col, old_val), new_val) in other_cols.iter().zip(old.iter()).zip(new.iter()) {
                if old_val != new_val {
                    sets.push(format!("{} = {}", quote_identifier(col), quote_value(new_val)));
                }
            }
            if sets.is_empty() {
                return Ok(None);
            }
            Ok(Some(format!(
                "UPDATE {quoted_table} SET {} WHERE {};",
                sets.join(", "),
                pk_where_clause(pk_cols, &diff.pk)
            )))
        }

        RowAction::Delete => Ok(Some(format!(
            "DELETE FROM {quoted_table} WHERE {};",
            pk_where_clause(pk_cols, &diff.pk)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rowdiff::diff_rows;

    fn attached_with(main_sql: &str, aux_sql: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("ATTACH DATABASE ':memory:' AS aux").unwrap();
        conn.execute_batch(main_sql).unwrap();
        conn.execute_batch(aux_sql).unwrap();
        conn
    }

    #[test]
    fn autoincrement_pk_detected() {
        let conn = attached_with("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)", "");
        assert!(has_autoincrement_pk(&conn, "main", "t").unwrap());
    }

    #[test]
    fn without_rowid_table_is_not_autoincrement() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT) WITHOUT ROWID",
            "",
        );
        assert!(!has_autoincrement_pk(&conn, "main", "t").unwrap());
    }

    #[test]
    fn add_under_new_pk_merge_omits_autoincrement_pk() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
        );
        let diffs = diff_rows(&conn, "t").unwrap();
        let sql = synthesise_sql(
            &conn,
            "t",
            &["id".to_string()],
            &["name".to_string()],
            &diffs[0],
            MergeStrategy::NewPkMerge,
        )
        .unwrap()
        .unwrap();
        assert_eq!(sql, "INSERT INTO \"t\"(\"name\") VALUES ('x');");
    }

    #[test]
    fn modify_only_sets_changed_columns() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, a TEXT, b TEXT); INSERT INTO t VALUES (1,'x','same')",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, a TEXT, b TEXT); INSERT INTO t VALUES (1,'y','same')",
        );
        let diffs = diff_rows(&conn, "t").unwrap();
        let sql = synthesise_sql(
            &conn,
            "t",
            &["id".to_string()],
            &["a".to_string(), "b".to_string()],
            &diffs[0],
            MergeStrategy::PreservePkMerge,
        )
        .unwrap()
        .unwrap();
        assert_eq!(sql, "UPDATE \"t\" SET \"a\" = 'y' WHERE \"id\" = 1;");
    }

    #[test]
    fn no_merge_emits_no_sql() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY)",
            "CREATE TABLE t(id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1)",
        );
        let diffs = diff_rows(&conn, "t").unwrap();
        assert!(synthesise_sql(&conn, "t", &["id".to_string()], &[], &diffs[0], MergeStrategy::NoMerge)
            .unwrap()
            .is_none());
    }
}
