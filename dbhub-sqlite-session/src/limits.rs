//! Connection resource limits (§4.1). Every value is set then read back so a
//! limit SQLite silently clamps (e.g. below its own compile-time ceiling)
//! is caught at open time instead of surfacing as a confusing query failure
//! later.

use rusqlite::{limits::Limit, Connection};

use crate::error::{SessionError, SessionResult};

/// One (limit, value) pair from §4.1's "exact values" list.
const LIMITS: &[(Limit, i32)] = &[
    (Limit::SQLITE_LIMIT_LENGTH, 1_000_000),
    (Limit::SQLITE_LIMIT_SQL_LENGTH, 100_000),
    (Limit::SQLITE_LIMIT_COLUMN, 400),
    (Limit::SQLITE_LIMIT_EXPR_DEPTH, 20),
    (Limit::SQLITE_LIMIT_COMPOUND_SELECT, 30),
    (Limit::SQLITE_LIMIT_VDBE_OP, 25_000),
    (Limit::SQLITE_LIMIT_FUNCTION_ARG, 8),
    (Limit::SQLITE_LIMIT_ATTACHED, 0),
    (Limit::SQLITE_LIMIT_LIKE_PATTERN_LENGTH, 50),
    (Limit::SQLITE_LIMIT_VARIABLE_NUMBER, 15),
    (Limit::SQLITE_LIMIT_TRIGGER_DEPTH, 10),
];

fn limit_name(limit: Limit) -> &'static str {
    match limit {
        Limit::SQLITE_LIMIT_LENGTH => "length",
        Limit::SQLITE_LIMIT_SQL_LENGTH => "sql_length",
        Limit::SQLITE_LIMIT_COLUMN => "column",
        Limit::SQLITE_LIMIT_EXPR_DEPTH => "expr_depth",
        Limit::SQLITE_LIMIT_COMPOUND_SELECT => "compound_select",
        Limit::SQLITE_LIMIT_VDBE_OP => "vdbe_op",
        Limit::SQLITE_LIMIT_FUNCTION_ARG => "function_arg",
        Limit::SQLITE_LIMIT_ATTACHED => "attached",
        Limit::SQLITE_LIMIT_LIKE_PATTERN_LENGTH => "like_pattern_length",
        Limit::SQLITE_LIMIT_VARIABLE_NUMBER => "variable_number",
        Limit::SQLITE_LIMIT_TRIGGER_DEPTH => "trigger_depth",
        _ => "unknown",
    }
}

/// Apply every defensive-mode limit to `conn`, failing the open if any of
/// them did not take effect (§4.1 "Verify each set call").
pub fn apply_defensive_limits(conn: &Connection) -> SessionResult<()> {
    for &(limit, requested) in LIMITS {
        conn.set_limit(limit, requested);
        let actual = conn.limit(limit);
        if actual != requested {
            return Err(SessionError::LimitNotApplied {
                limit: limit_name(limit),
                requested,
                actual,
            });
        }
    }
    Ok(())
}

fn verify_pragma_bool(conn: &Connection, pragma: &'static str, expected: bool) -> SessionResult<()> {
    let actual: bool = conn
        .pragma_query_value(None, pragma, |row| row.get(0))
        .map_err(SessionError::Sqlite)?;
    if actual != expected {
        return Err(SessionError::PragmaNotApplied { pragma });
    }
    Ok(())
}

/// Apply the shared hardening pragmas from §4.1: `defensive` on,
/// `trusted_schema` off, `cell_size_check` on, `mmap_size` disabled.
pub fn apply_hardening_pragmas(conn: &Connection) -> SessionResult<()> {
    conn.pragma_update(None, "defensive", true)?;
    verify_pragma_bool(conn, "defensive", true)?;

    conn.pragma_update(None, "trusted_schema", false)?;
    verify_pragma_bool(conn, "trusted_schema", false)?;

    conn.pragma_update(None, "cell_size_check", true)?;
    verify_pragma_bool(conn, "cell_size_check", true)?;

    conn.pragma_update(None, "mmap_size", 0i64)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defensive_limits_apply_on_memory_db() {
        let conn = Connection::open_in_memory().unwrap();
        apply_defensive_limits(&conn).unwrap();
        assert_eq!(conn.limit(Limit::SQLITE_LIMIT_ATTACHED), 0);
        assert_eq!(conn.limit(Limit::SQLITE_LIMIT_COLUMN), 400);
    }

    #[test]
    fn hardening_pragmas_apply_on_memory_db() {
        let conn = Connection::open_in_memory().unwrap();
        apply_hardening_pragmas(&conn).unwrap();
    }
}
