//! Key operations over an opened [`Session`] (§4.1b).

use std::collections::BTreeSet;

use base64::{engine::general_purpose, Engine as _};
use rusqlite::types::ValueRef;

use crate::error::{SessionError, SessionResult};
use crate::escape::{quote_identifier, SqlValue};
use crate::session::Session;

/// The primary key shape of a table or view (§9 design note: modelled as a
/// tri-state enum rather than an always-present column list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// One or more explicit `PRIMARY KEY` columns, in key order.
    Explicit(Vec<String>),
    /// No explicit PK; `rowid`/`_rowid_`/`oid`, whichever is unshadowed.
    Implicit(String),
    /// Views have no primary key.
    None,
}

impl PrimaryKey {
    pub fn columns(&self) -> Vec<String> {
        match self {
            PrimaryKey::Explicit(cols) => cols.clone(),
            PrimaryKey::Implicit(name) => vec![name.clone()],
            PrimaryKey::None => vec![],
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, PrimaryKey::Implicit(_))
    }
}

struct TableInfoRow {
    name: String,
    pk: i64,
}

fn table_info(session: &Session, schema: &str, table: &str) -> SessionResult<Vec<TableInfoRow>> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(schema),
        quote_identifier(table)
    );
    let conn = session.connection();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TableInfoRow {
                name: row.get("name")?,
                pk: row.get("pk")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `GetPrimaryKeyAndOtherColumns` (§4.1b): runs `PRAGMA table_info`,
/// collects the explicit PK columns in `pk` order, falling back to the
/// first unshadowed `rowid`/`_rowid_`/`oid` alias. `is_view` selects
/// [`PrimaryKey::None`] since views have no rowid.
pub fn primary_key_and_other_columns(
    session: &Session,
    schema: &str,
    table: &str,
    is_view: bool,
) -> SessionResult<(PrimaryKey, Vec<String>)> {
    let rows = table_info(session, schema, table)?;

    let mut pk_cols: Vec<(i64, String)> = rows
        .iter()
        .filter(|r| r.pk > 0)
        .map(|r| (r.pk, r.name.clone()))
        .collect();
    pk_cols.sort_by_key(|(order, _)| *order);

    let all_names: BTreeSet<String> = rows.iter().map(|r| r.name.clone()).collect();

    let pk = if !pk_cols.is_empty() {
        PrimaryKey::Explicit(pk_cols.iter().map(|(_, name)| name.clone()).collect())
    } else if is_view {
        PrimaryKey::None
    } else {
        let alias = ["rowid", "_rowid_", "oid"]
            .into_iter()
            .find(|candidate| !all_names.contains(*candidate))
            .ok_or_else(|| SessionError::NoUsablePrimaryKey {
                table: table.to_string(),
            })?;
        PrimaryKey::Implicit(alias.to_string())
    };

    let pk_names: BTreeSet<String> = pk.columns().into_iter().collect();
    let other_cols = rows
        .into_iter()
        .map(|r| r.name)
        .filter(|name| !pk_names.contains(name))
        .collect();

    Ok((pk, other_cols))
}

/// Sorted list of table names in `main` (§4.1b `Tables`).
pub fn tables(session: &Session) -> SessionResult<Vec<String>> {
    object_names(session, "table")
}

/// Sorted list of view names in `main` (§4.1b `Views`).
pub fn views(session: &Session) -> SessionResult<Vec<String>> {
    object_names(session, "view")
}

/// Sorted union of tables and views (§4.1b `TablesAndViews`).
pub fn tables_and_views(session: &Session) -> SessionResult<Vec<String>> {
    let mut names: BTreeSet<String> = tables(session)?.into_iter().collect();
    names.extend(views(session)?);
    Ok(names.into_iter().collect())
}

fn object_names(session: &Session, object_type: &str) -> SessionResult<Vec<String>> {
    let conn = session.connection();
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = ?1 AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([object_type], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Options for [`read_sqlite_db_cols`].
pub struct ReadColsOptions<'a> {
    pub sort_col: Option<&'a str>,
    pub sort_dir: SortDir,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A page of rows plus the total row count (§4.1b `ReadSQLiteDBCols`).
pub struct RowPage {
    pub rows: Vec<Vec<SqlValue>>,
    pub column_names: Vec<String>,
    pub total_rows: u64,
}

/// Checks whether any index already covers `sort_col` as its leading column.
fn index_covers_column(session: &Session, table: &str, sort_col: &str) -> SessionResult<bool> {
    let conn = session.connection();
    let sql = format!("PRAGMA index_list({})", quote_identifier(table));
    let mut stmt = conn.prepare(&sql)?;
    let index_names = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;

    for index_name in index_names {
        let info_sql = format!("PRAGMA index_info({})", quote_identifier(&index_name));
        let mut info_stmt = conn.prepare(&info_sql)?;
        let leading: Option<String> = info_stmt
            .query_map([], |row| row.get::<_, String>("name"))?
            .next()
            .transpose()?;
        if leading.as_deref() == Some(sort_col) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `ReadSQLiteDBCols` (§4.1b): synthesises a covering index on the fly if
/// `sort_col` is set and nothing covers it yet (named `<table>_<col>_idx`),
/// then runs the paginated `SELECT *` plus a `count(*)`.
///
/// §9 flags on-the-fly index creation as a latency hazard on large tables;
/// callers under contention should disable it and pass an already-covered
/// `sort_col` instead.
pub fn read_sqlite_db_cols(
    session: &Session,
    table: &str,
    opts: ReadColsOptions<'_>,
) -> SessionResult<RowPage> {
    if let Some(sort_col) = opts.sort_col {
        if !index_covers_column(session, table, sort_col)? {
            let index_name = format!("{table}_{sort_col}_idx");
            let sql = format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_identifier(&index_name),
                quote_identifier(table),
                quote_identifier(sort_col)
            );
            session.connection().execute_batch(&sql)?;
        }
    }

    let mut sql = format!("SELECT * FROM {}", quote_identifier(table));
    if let Some(sort_col) = opts.sort_col {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_identifier(sort_col),
            opts.sort_dir.as_sql()
        ));
    }
    if let Some(limit) = opts.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = opts.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    let (column_names, rows) = run_select(session, &sql)?;

    let count_sql = format!("SELECT count(*) FROM {}", quote_identifier(table));
    let total_rows: i64 = session
        .connection()
        .query_row(&count_sql, [], |row| row.get(0))?;

    Ok(RowPage {
        rows,
        column_names,
        total_rows: total_rows as u64,
    })
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

fn run_select(session: &Session, sql: &str) -> SessionResult<(Vec<String>, Vec<Vec<SqlValue>>)> {
    let conn = session.connection();
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let n = column_names.len();
    let rows = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(n);
            for i in 0..n {
                values.push(value_from_ref(row.get_ref(i)?));
            }
            Ok(values)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((column_names, rows))
}

/// Where a rendered cell is headed, governing NULL/BLOB representation
/// (§4.1b `SQLiteRunQuery`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSource {
    /// API and internal callers: typed null cell, base64 or hex-literal blob.
    Api,
    /// Front-end HTML rendering: `<i>NULL</i>` / `<i>BINARY DATA</i>`.
    Html,
}

/// A single rendered cell (§4.1b).
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedCell {
    Integer(i64),
    Float(String),
    Text(String),
    Blob(String),
    Null,
    Html(&'static str),
}

fn render_cell(value: &SqlValue, source: RenderSource, ignore_binary: bool, ignore_null: bool) -> RenderedCell {
    match (value, source) {
        (SqlValue::Null, RenderSource::Html) if ignore_null => RenderedCell::Html("<i>NULL</i>"),
        (SqlValue::Null, _) => RenderedCell::Null,
        (SqlValue::Blob(_), RenderSource::Html) if ignore_binary => {
            RenderedCell::Html("<i>BINARY DATA</i>")
        }
        (SqlValue::Blob(bytes), RenderSource::Api) => {
            RenderedCell::Blob(general_purpose::STANDARD.encode(bytes))
        }
        (SqlValue::Blob(bytes), RenderSource::Html) => {
            RenderedCell::Blob(format!("x'{}'", hex::encode(bytes)))
        }
        (SqlValue::Integer(i), _) => RenderedCell::Integer(*i),
        // §4.1b: floats formatted with full precision ('f', -1).
        (SqlValue::Real(f), _) => RenderedCell::Float(format!("{f}")),
        (SqlValue::Text(s), _) => RenderedCell::Text(s.clone()),
    }
}

/// Memory usage returned by SQLite's allocator after running the query
/// (§4.1b), bracketing the `LogSQLiteQueryBefore`/`After` usage log (§4.7).
pub struct QueryStats {
    pub memory_used: i64,
    pub memory_highwater: i64,
}

/// `SQLiteRunQuery` (§4.1b): prepares `sql` once, iterates every row,
/// classifying cells by declared type and rendering them per `source`.
pub fn sqlite_run_query(
    session: &Session,
    sql: &str,
    source: RenderSource,
    ignore_binary: bool,
    ignore_null: bool,
) -> SessionResult<(QueryStats, Vec<String>, Vec<Vec<RenderedCell>>)> {
    let (column_names, raw_rows) = run_select(session, sql)?;

    let rendered = raw_rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| render_cell(v, source, ignore_binary, ignore_null))
                .collect()
        })
        .collect();

    let memory_used = rusqlite::memory_used() as i64;
    let memory_highwater = rusqlite::memory_highwater(false) as i64;

    Ok((
        QueryStats {
            memory_used,
            memory_highwater,
        },
        column_names,
        rendered,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn live_db_with_table() -> (tempfile::TempDir, Session) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.sqlite");
        let session = Session::open_live(&path).unwrap();
        session
            .connection()
            .execute_batch(
                "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT);
                 INSERT INTO t(name) VALUES ('a'), ('b'), (NULL);",
            )
            .unwrap();
        (dir, session)
    }

    #[test]
    fn explicit_primary_key_detected() {
        let (_dir, session) = live_db_with_table();
        let (pk, other) = primary_key_and_other_columns(&session, "main", "t", false).unwrap();
        assert_eq!(pk, PrimaryKey::Explicit(vec!["id".to_string()]));
        assert_eq!(other, vec!["name".to_string()]);
    }

    #[test]
    fn implicit_primary_key_falls_back_to_rowid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.sqlite");
        let session = Session::open_live(&path).unwrap();
        session
            .connection()
            .execute_batch("CREATE TABLE t(name TEXT)")
            .unwrap();
        let (pk, _other) = primary_key_and_other_columns(&session, "main", "t", false).unwrap();
        assert_eq!(pk, PrimaryKey::Implicit("rowid".to_string()));
    }

    #[test]
    fn implicit_primary_key_skips_shadowed_alias() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.sqlite");
        let session = Session::open_live(&path).unwrap();
        session
            .connection()
            .execute_batch("CREATE TABLE t(rowid_ignored TEXT, rowid TEXT)")
            .unwrap();
        // `rowid` column name itself only shadows the alias inside WITHOUT
        // ROWID tables; on a normal table SQLite still treats a user column
        // literally named `rowid` as occupying that name.
        let (pk, _other) = primary_key_and_other_columns(&session, "main", "t", false).unwrap();
        assert_eq!(pk, PrimaryKey::Implicit("_rowid_".to_string()));
    }

    #[test]
    fn views_have_no_primary_key() {
        let (_dir, session) = live_db_with_table();
        session
            .connection()
            .execute_batch("CREATE VIEW v AS SELECT * FROM t")
            .unwrap();
        let (pk, _other) = primary_key_and_other_columns(&session, "main", "v", true).unwrap();
        assert_eq!(pk, PrimaryKey::None);
    }

    #[test]
    fn tables_and_views_are_sorted_and_unioned() {
        let (_dir, session) = live_db_with_table();
        session
            .connection()
            .execute_batch("CREATE VIEW av AS SELECT * FROM t; CREATE TABLE zt(id INTEGER);")
            .unwrap();
        assert_eq!(tables(&session).unwrap(), vec!["t", "zt"]);
        assert_eq!(views(&session).unwrap(), vec!["av"]);
        assert_eq!(tables_and_views(&session).unwrap(), vec!["av", "t", "zt"]);
    }

    #[test]
    fn read_sqlite_db_cols_paginates_and_counts() {
        let (_dir, session) = live_db_with_table();
        let page = read_sqlite_db_cols(
            &session,
            "t",
            ReadColsOptions {
                sort_col: Some("id"),
                sort_dir: SortDir::Desc,
                limit: Some(2),
                offset: Some(0),
            },
        )
        .unwrap();
        assert_eq!(page.total_rows, 3);
        assert_eq!(page.rows.len(), 2);
    }

    #[test]
    fn sqlite_run_query_renders_null_as_html_placeholder() {
        let (_dir, session) = live_db_with_table();
        let (_stats, _cols, rows) = sqlite_run_query(
            &session,
            "SELECT name FROM t ORDER BY id",
            RenderSource::Html,
            true,
            true,
        )
        .unwrap();
        assert!(matches!(rows[2][0], RenderedCell::Html("<i>NULL</i>")));
    }

    #[test]
    fn sqlite_run_query_renders_null_as_typed_cell_for_api() {
        let (_dir, session) = live_db_with_table();
        let (_stats, _cols, rows) = sqlite_run_query(
            &session,
            "SELECT name FROM t ORDER BY id",
            RenderSource::Api,
            false,
            false,
        )
        .unwrap();
        assert!(matches!(rows[2][0], RenderedCell::Null));
    }
}
