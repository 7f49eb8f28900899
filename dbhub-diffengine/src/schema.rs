//! Schema introspection and diffing (§4.2). Compares `sqlite_master` rows
//! between two attached schemas by (type, name), carrying the raw `sql`
//! text so modifications can be rendered verbatim (DROP old, CREATE new).

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::error::{DiffError, DiffResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Trigger,
}

impl ObjectKind {
    /// Ordering invariant (§8): every `table` changeset precedes every
    /// non-`table` changeset, and every `trigger` changeset is last.
    fn order_key(&self) -> u8 {
        match self {
            ObjectKind::Table => 0,
            ObjectKind::View | ObjectKind::Index => 1,
            ObjectKind::Trigger => 2,
        }
    }

    fn from_sqlite_type(t: &str) -> DiffResult<Self> {
        match t {
            "table" => Ok(ObjectKind::Table),
            "view" => Ok(ObjectKind::View),
            "index" => Ok(ObjectKind::Index),
            "trigger" => Ok(ObjectKind::Trigger),
            other => Err(DiffError::UnsupportedObjectType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAction {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone)]
pub struct SchemaChange {
    pub kind: ObjectKind,
    pub name: String,
    pub action: SchemaAction,
    pub old_sql: Option<String>,
    pub new_sql: Option<String>,
}

struct ObjectRow {
    kind: ObjectKind,
    sql: Option<String>,
}

fn schema_objects(conn: &Connection, schema: &str) -> DiffResult<BTreeMap<String, ObjectRow>> {
    let sql = format!(
        "SELECT type, name, sql FROM {schema}.sqlite_master \
         WHERE name NOT LIKE 'sqlite\\_%' ESCAPE '\\'"
    );
    let mut stmt = conn.prepare(&sql).map_err(DiffError::SchemaIntrospection)?;
    let rows = stmt
        .query_map([], |row| {
            let object_type: String = row.get(0)?;
            let name: String = row.get(1)?;
            let sql: Option<String> = row.get(2)?;
            Ok((object_type, name, sql))
        })
        .map_err(DiffError::SchemaIntrospection)?;

    let mut out = BTreeMap::new();
    for row in rows {
        let (object_type, name, sql) = row.map_err(DiffError::SchemaIntrospection)?;
        let kind = match ObjectKind::from_sqlite_type(&object_type) {
            Ok(kind) => kind,
            // auto-indexes created implicitly by UNIQUE/PK constraints carry
            // no independent `sql` and are not user schema objects.
            Err(_) if object_type == "index" && sql.is_none() => continue,
            Err(e) => return Err(e),
        };
        out.insert(format!("{object_type}:{name}"), ObjectRow { kind, sql });
    }
    Ok(out)
}

/// Diffs the schema of `main` against `aux`, producing changesets ordered
/// per the table-first/trigger-last invariant.
pub fn diff_schema(conn: &Connection) -> DiffResult<Vec<SchemaChange>> {
    let a = schema_objects(conn, "main")?;
    let b = schema_objects(conn, "aux")?;

    let mut names: Vec<&String> = a.keys().chain(b.keys()).collect();
    names.sort();
    names.dedup();

    let mut changes = Vec::new();
    for key in names {
        let name = key.split_once(':').map(|(_, n)| n).unwrap_or(key).to_string();
        match (a.get(key), b.get(key)) {
            (Some(a_row), None) => changes.push(SchemaChange {
                kind: a_row.kind,
                name,
                action: SchemaAction::Removed,
                old_sql: a_row.sql.clone(),
                new_sql: None,
            }),
            (None, Some(b_row)) => changes.push(SchemaChange {
                kind: b_row.kind,
                name,
                action: SchemaAction::Added,
                old_sql: None,
                new_sql: b_row.sql.clone(),
            }),
            (Some(a_row), Some(b_row)) if a_row.sql != b_row.sql => changes.push(SchemaChange {
                kind: b_row.kind,
                name,
                action: SchemaAction::Modified,
                old_sql: a_row.sql.clone(),
                new_sql: b_row.sql.clone(),
            }),
            _ => {}
        }
    }

    changes.sort_by_key(|c| (c.kind.order_key(), c.name.clone()));
    Ok(changes)
}

/// Table names present in `main`, used to drive the row-diff pass (§4.2a).
pub fn table_names(conn: &Connection, schema: &str) -> DiffResult<Vec<String>> {
    let sql = format!(
        "SELECT name FROM {schema}.sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
         ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql).map_err(DiffError::SchemaIntrospection)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(DiffError::SchemaIntrospection)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DiffError::SchemaIntrospection)?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("ATTACH DATABASE ':memory:' AS aux").unwrap();
        conn
    }

    #[test]
    fn detects_added_table() {
        let conn = attached();
        conn.execute_batch("CREATE TABLE aux.t(id INTEGER PRIMARY KEY)")
            .unwrap();
        let changes = diff_schema(&conn).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, SchemaAction::Added);
        assert_eq!(changes[0].kind, ObjectKind::Table);
    }

    #[test]
    fn tables_precede_triggers_and_triggers_come_last() {
        let conn = attached();
        conn.execute_batch(
            "CREATE TABLE aux.t(id INTEGER PRIMARY KEY);
             CREATE TRIGGER aux.trg AFTER INSERT ON t BEGIN SELECT 1; END;
             CREATE VIEW aux.v AS SELECT * FROM t;",
        )
        .unwrap();
        let changes = diff_schema(&conn).unwrap();
        let kinds: Vec<ObjectKind> = changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds[0], ObjectKind::Table);
        assert_eq!(*kinds.last().unwrap(), ObjectKind::Trigger);
    }

    #[test]
    fn identical_schemas_yield_no_changes() {
        let conn = attached();
        conn.execute_batch(
            "CREATE TABLE main.t(id INTEGER PRIMARY KEY);
             CREATE TABLE aux.t(id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        assert!(diff_schema(&conn).unwrap().is_empty());
    }
}
