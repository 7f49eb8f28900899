//! Row diff query (§4.2a). Assumes identical schemas on both sides; the PK
//! join uses `IS` throughout so `NULL` primary-key components (WITHOUT
//! ROWID tables with nullable key parts) still match correctly.

use dbhub_sqlite_session::escape::{quote_identifier, SqlValue};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::{DiffError, DiffResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Add,
    Modify,
    Delete,
}

impl RowAction {
    fn from_sql(s: &str) -> Self {
        match s {
            "add" => RowAction::Add,
            "delete" => RowAction::Delete,
            _ => RowAction::Modify,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RowDiff {
    pub pk: Vec<SqlValue>,
    pub action: RowAction,
    /// `main`-side values for `other_cols`, `None` for an `add`.
    pub old: Option<Vec<SqlValue>>,
    /// `aux`-side values for `other_cols`, `None` for a `delete`.
    pub new: Option<Vec<SqlValue>>,
}

pub fn pk_columns(conn: &Connection, schema: &str, table: &str) -> DiffResult<Vec<String>> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(schema),
        quote_identifier(table)
    );
    let mut stmt = conn.prepare(&sql).map_err(DiffError::SchemaIntrospection)?;
    let mut cols: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get("pk")?, row.get("name")?)))
        .map_err(DiffError::SchemaIntrospection)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DiffError::SchemaIntrospection)?
        .into_iter()
        .filter(|(pk, _)| *pk > 0)
        .collect();
    cols.sort_by_key(|(order, _)| *order);
    if cols.is_empty() {
        // No explicit PK: fall back to rowid, which is always present and
        // unique for a table the diff engine is willing to compare row by
        // row (WITHOUT ROWID tables without an explicit PK do not exist).
        return Ok(vec!["rowid".to_string()]);
    }
    Ok(cols.into_iter().map(|(_, name)| name).collect())
}

pub fn other_columns(conn: &Connection, schema: &str, table: &str, pk: &[String]) -> DiffResult<Vec<String>> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(schema),
        quote_identifier(table)
    );
    let mut stmt = conn.prepare(&sql).map_err(DiffError::SchemaIntrospection)?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>("name"))
        .map_err(DiffError::SchemaIntrospection)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DiffError::SchemaIntrospection)?;
    Ok(names.into_iter().filter(|n| !pk.contains(n)).collect())
}

fn join_clause(pk: &[String]) -> String {
    pk.iter()
        .map(|c| {
            let q = quote_identifier(c);
            format!("a.{q} IS b.{q}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn select_list(alias: &str, cols: &[String]) -> String {
    cols.iter()
        .map(|c| format!("{alias}.{}", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds and runs the three-way `UNION ALL` query for one table, returning
/// every `RowDiff` ordered by the first PK column.
pub fn diff_rows(conn: &Connection, table: &str) -> DiffResult<Vec<RowDiff>> {
    let pk = pk_columns(conn, "main", table)?;
    let other = other_columns(conn, "main", table, &pk)?;

    let quoted_table = quote_identifier(table);
    let join = join_clause(&pk);
    let pk_select_a = select_list("a", &pk);
    let pk_select_b = select_list("b", &pk);

    let diff_exprs = if other.is_empty() {
        "0".to_string()
    } else {
        other
            .iter()
            .map(|c| {
                let q = quote_identifier(c);
                format!("a.{q} IS NOT b.{q}")
            })
            .collect::<Vec<_>>()
            .join(" OR ")
    };

    let a_other = if other.is_empty() {
        String::new()
    } else {
        format!(", {}", select_list("a", &other))
    };
    let b_other = if other.is_empty() {
        String::new()
    } else {
        format!(", {}", select_list("b", &other))
    };
    let null_other = if other.is_empty() {
        String::new()
    } else {
        format!(", {}", other.iter().map(|_| "NULL").collect::<Vec<_>>().join(", "))
    };

    let sql = format!(
        "SELECT 'modify' AS action, {pk_select_a}{a_other}{b_other_placeholder}
         FROM main.{quoted_table} a JOIN aux.{quoted_table} b ON {join}
         WHERE {diff_exprs}
         UNION ALL
         SELECT 'delete', {pk_select_a}{a_other}{null_other}
         FROM main.{quoted_table} a
         WHERE NOT EXISTS (SELECT 1 FROM aux.{quoted_table} b WHERE {join})
         UNION ALL
         SELECT 'add', {pk_select_b}{null_other}{b_other}
         FROM aux.{quoted_table} b
         WHERE NOT EXISTS (SELECT 1 FROM main.{quoted_table} a WHERE {join})
         ORDER BY 2",
        pk_select_a = pk_select_a,
        a_other = a_other,
        b_other_placeholder = b_other,
        quoted_table = quoted_table,
        join = join,
        diff_exprs = diff_exprs,
        null_other = null_other,
        pk_select_b = pk_select_b,
        b_other = b_other,
    );

    let n_pk = pk.len();
    let n_other = other.len();

    let mut stmt = conn.prepare(&sql).map_err(|e| DiffError::RowDiffQuery {
        table: table.to_string(),
        source: e,
    })?;

    let rows = stmt
        .query_map([], |row| {
            let action: String = row.get(0)?;
            let mut pk_values = Vec::with_capacity(n_pk);
            for i in 0..n_pk {
                pk_values.push(value_from_ref(row.get_ref(1 + i)?));
            }
            let mut a_values = Vec::with_capacity(n_other);
            for i in 0..n_other {
                a_values.push(value_from_ref(row.get_ref(1 + n_pk + i)?));
            }
            let mut b_values = Vec::with_capacity(n_other);
            for i in 0..n_other {
                b_values.push(value_from_ref(row.get_ref(1 + n_pk + n_other + i)?));
            }
            Ok((action, pk_values, a_values, b_values))
        })
        .map_err(|e| DiffError::RowDiffQuery {
            table: table.to_string(),
            source: e,
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DiffError::RowDiffQuery {
            table: table.to_string(),
            source: e,
        })?;

    Ok(rows
        .into_iter()
        .map(|(action, pk, a_values, b_values)| {
            let action = RowAction::from_sql(&action);
            RowDiff {
                pk,
                old: if action == RowAction::Add { None } else { Some(a_values) },
                new: if action == RowAction::Delete { None } else { Some(b_values) },
                action,
            }
        })
        .collect())
}

/// Enumerates every row of `schema`.`table` as a full-table `RowDiff` under
/// `action` (`Add` or `Delete`), used where there's no matching table on the
/// other side to join against at all: a table present on only one side of a
/// diff, or a table whose schema changed (§4.2 cases 1/2/4).
pub fn full_table_diff(conn: &Connection, schema: &str, table: &str, action: RowAction) -> DiffResult<Vec<RowDiff>> {
    let pk = pk_columns(conn, schema, table)?;
    let other = other_columns(conn, schema, table, &pk)?;

    let quoted_table = quote_identifier(table);
    let pk_select = select_list("t", &pk);
    let other_select = if other.is_empty() {
        String::new()
    } else {
        format!(", {}", select_list("t", &other))
    };

    let sql = format!("SELECT {pk_select}{other_select} FROM {schema}.{quoted_table} t ORDER BY 1");

    let n_pk = pk.len();
    let n_other = other.len();

    let mut stmt = conn.prepare(&sql).map_err(|e| DiffError::RowDiffQuery {
        table: table.to_string(),
        source: e,
    })?;

    let rows = stmt
        .query_map([], |row| {
            let mut pk_values = Vec::with_capacity(n_pk);
            for i in 0..n_pk {
                pk_values.push(value_from_ref(row.get_ref(i)?));
            }
            let mut other_values = Vec::with_capacity(n_other);
            for i in 0..n_other {
                other_values.push(value_from_ref(row.get_ref(n_pk + i)?));
            }
            Ok((pk_values, other_values))
        })
        .map_err(|e| DiffError::RowDiffQuery {
            table: table.to_string(),
            source: e,
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DiffError::RowDiffQuery {
            table: table.to_string(),
            source: e,
        })?;

    Ok(rows
        .into_iter()
        .map(|(pk, other_values)| RowDiff {
            pk,
            old: if action == RowAction::Delete { Some(other_values.clone()) } else { None },
            new: if action == RowAction::Add { Some(other_values) } else { None },
            action,
        })
        .collect())
}

fn value_from_ref(v: ValueRef<'_>) -> SqlValue {
    match v {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached_with(main_sql: &str, aux_sql: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("ATTACH DATABASE ':memory:' AS aux").unwrap();
        conn.execute_batch(main_sql).unwrap();
        conn.execute_batch(aux_sql).unwrap();
        conn
    }

    #[test]
    fn detects_add() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
        );
        let diffs = diff_rows(&conn, "t").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].action, RowAction::Add);
        assert_eq!(diffs[0].pk, vec![SqlValue::Integer(1)]);
    }

    #[test]
    fn detects_modify() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'y')",
        );
        let diffs = diff_rows(&conn, "t").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].action, RowAction::Modify);
        assert_eq!(diffs[0].new, Some(vec![SqlValue::Text("y".to_string())]));
    }

    #[test]
    fn detects_delete() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
        );
        let diffs = diff_rows(&conn, "t").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].action, RowAction::Delete);
    }

    #[test]
    fn identical_rows_yield_no_diff() {
        let conn = attached_with(
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t VALUES (1, 'x')",
        );
        assert!(diff_rows(&conn, "t").unwrap().is_empty());
    }
}
