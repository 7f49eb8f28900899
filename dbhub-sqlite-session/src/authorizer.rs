//! Authorizer policy (§4.1a). Two modes share one allow-list of functions;
//! they differ only in which statements and pragmas they accept.

use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::Connection;

/// Function names a defensive or live session may call. Covers core,
/// date/time, aggregate, window, JSON1, FTS3/4/5, R*Tree, Geopoly and math
/// families; `load_extension` is deliberately absent from every mode.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    // core scalar
    "abs", "changes", "char", "coalesce", "format", "glob", "hex", "ifnull", "iif", "instr",
    "last_insert_rowid", "length", "like", "likelihood", "likely", "load_extension_disabled",
    "lower", "ltrim", "max", "min", "nullif", "octet_length", "printf", "quote", "random",
    "randomblob", "replace", "round", "rtrim", "sign", "soundex", "sqlite_compileoption_get",
    "sqlite_compileoption_used", "sqlite_offset", "sqlite_source_id", "sqlite_version",
    "substr", "substring", "total_changes", "trim", "typeof", "unicode", "unlikely", "upper",
    "zeroblob",
    // date/time
    "date", "time", "datetime", "julianday", "unixepoch", "strftime", "timediff",
    // aggregate
    "avg", "count", "group_concat", "string_agg", "sum", "total",
    // window
    "row_number", "rank", "dense_rank", "percent_rank", "cume_dist", "ntile", "lag", "lead",
    "first_value", "last_value", "nth_value",
    // json1
    "json", "json_array", "json_array_length", "json_error_position", "json_extract",
    "json_insert", "json_object", "json_patch", "json_quote", "json_remove", "json_replace",
    "json_set", "json_type", "json_valid", "json_group_array", "json_group_object",
    "json_each", "json_tree",
    // fts3/4/5
    "snippet", "offsets", "matchinfo", "optimize", "highlight", "bm25",
    // r*tree / geopoly
    "rtreecheck", "rtreedepth", "rtreenode", "geopoly_area", "geopoly_bbox", "geopoly_blob",
    "geopoly_contains_point", "geopoly_json", "geopoly_overlap", "geopoly_regular",
    "geopoly_svg", "geopoly_within", "geopoly_xform",
    // math
    "acos", "acosh", "asin", "asinh", "atan", "atan2", "atanh", "ceil", "ceiling", "cos",
    "cosh", "degrees", "exp", "floor", "ln", "log", "log2", "log10", "mod", "pi", "pow",
    "power", "radians", "sin", "sinh", "sqrt", "tan", "tanh", "trunc",
];

fn function_allowed(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower != "load_extension" && ALLOWED_FUNCTIONS.contains(&lower.as_str())
}

/// SELECT-only authorizer for defensive-mode sessions against untrusted SQL
/// (§4.1a). Accepts `SELECT`, `READ`, `UPDATE(sqlite_master)` (SQLite's own
/// query-planner bookkeeping), `PRAGMA table_info`, and allow-listed
/// functions; denies everything else.
pub fn select_only(action: AuthContext<'_>) -> Authorization {
    match action.action {
        AuthAction::Select | AuthAction::Read { .. } | AuthAction::Recursive => {
            Authorization::Allow
        }
        AuthAction::Update { table_name, .. } if table_name == "sqlite_master" => {
            Authorization::Allow
        }
        AuthAction::Pragma { pragma_name, .. } if pragma_name.eq_ignore_ascii_case("table_info") => {
            Authorization::Allow
        }
        AuthAction::Function { function_name } if function_allowed(function_name) => {
            Authorization::Allow
        }
        _ => Authorization::Deny,
    }
}

/// Authorizer for a live session executing writes against a live DB
/// (§4.1a). Accepts everything except `load_extension` and any pragma other
/// than `table_info`, `index_info`, `data_version`, `page_size`.
pub fn live(action: AuthContext<'_>) -> Authorization {
    const ALLOWED_PRAGMAS: &[&str] = &["table_info", "index_info", "data_version", "page_size"];

    match action.action {
        AuthAction::Function { function_name } if function_name.eq_ignore_ascii_case("load_extension") => {
            Authorization::Deny
        }
        AuthAction::Pragma { pragma_name, .. } => {
            if ALLOWED_PRAGMAS
                .iter()
                .any(|p| pragma_name.eq_ignore_ascii_case(p))
            {
                Authorization::Allow
            } else {
                Authorization::Deny
            }
        }
        _ => Authorization::Allow,
    }
}

pub fn install_select_only(conn: &Connection) {
    conn.authorizer(Some(select_only));
}

pub fn install_live(conn: &Connection) {
    conn.authorizer(Some(live));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_only_rejects_writes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        install_select_only(&conn);

        for sql in [
            "INSERT INTO t(v) VALUES ('x')",
            "UPDATE t SET v = 'y'",
            "DELETE FROM t",
            "CREATE TABLE u(id INTEGER)",
            "ATTACH DATABASE ':memory:' AS aux",
            "PRAGMA journal_mode = WAL",
        ] {
            assert!(
                conn.execute_batch(sql).is_err(),
                "expected {sql} to be denied"
            );
        }
    }

    #[test]
    fn select_only_allows_select_and_table_info() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        install_select_only(&conn);

        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .unwrap();
        conn.execute_batch("PRAGMA table_info(t)").unwrap();
    }

    #[test]
    fn select_only_rejects_load_extension() {
        let conn = Connection::open_in_memory().unwrap();
        install_select_only(&conn);
        assert!(conn
            .query_row("SELECT load_extension('x')", [], |_| Ok(()))
            .is_err());
    }

    #[test]
    fn live_rejects_load_extension_but_allows_writes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        install_live(&conn);

        conn.execute("INSERT INTO t(v) VALUES ('x')", []).unwrap();
        assert!(conn
            .query_row("SELECT load_extension('x')", [], |_| Ok(()))
            .is_err());
    }

    #[test]
    fn live_rejects_disallowed_pragmas() {
        let conn = Connection::open_in_memory().unwrap();
        install_live(&conn);
        assert!(conn.execute_batch("PRAGMA journal_mode = WAL").is_err());
        conn.execute_batch("PRAGMA data_version").unwrap();
    }
}
