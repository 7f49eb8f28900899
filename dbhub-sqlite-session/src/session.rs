//! Sandboxed SQLite session (§4.1): opening a connection in either
//! defensive (read-only, untrusted SQL) or live (read-write) mode, with the
//! hardening pragmas, limits and authorizer from §4.1/§4.1a applied and
//! verified before the session is handed back to a caller.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::authorizer;
use crate::error::SessionResult;
use crate::limits::{apply_defensive_limits, apply_hardening_pragmas};

/// Which authorizer policy (§4.1a) a session was opened with. Kept on the
/// struct so callers (and tests) can assert which mode is in effect without
/// re-deriving it from the open flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Defensive,
    Live,
}

/// A SQLite connection hardened per §4.1, tagged with the mode it was
/// opened in.
pub struct Session {
    pub(crate) conn: Connection,
    pub mode: SessionMode,
}

impl Session {
    /// Open `path` read-only with the SELECT-only authorizer (§4.1
    /// "Read-only defensive mode"), for running untrusted SQL against a
    /// versioned-DB snapshot.
    pub fn open_defensive(path: &Path) -> SessionResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.set_db_config(rusqlite::config::DbConfig::SQLITE_DBCONFIG_ENABLE_QPSG, false)
            .ok();
        Self::harden(&conn)?;
        authorizer::install_select_only(&conn);
        Ok(Self {
            conn,
            mode: SessionMode::Defensive,
        })
    }

    /// Open `path` read-write with the live authorizer (§4.1 "Live mode"),
    /// for executing writes against a live DB pinned to this node.
    pub fn open_live(path: &Path) -> SessionResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        Self::harden(&conn)?;
        authorizer::install_live(&conn);
        Ok(Self {
            conn,
            mode: SessionMode::Live,
        })
    }

    fn harden(conn: &Connection) -> SessionResult<()> {
        conn.pragma_update(None, "extended_result_codes", true)?;
        apply_hardening_pragmas(conn)?;
        apply_defensive_limits(conn)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// `PRAGMA integrity_check` (§4.1b), used before accepting an upload
    /// and after each live-DB backup (§4.3).
    pub fn integrity_check(&self) -> SessionResult<bool> {
        let result: String =
            self.conn
                .pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        Ok(result == "ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defensive_mode_rejects_write_attempts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY)")
                .unwrap();
        }
        let session = Session::open_defensive(&path).unwrap();
        assert_eq!(session.mode, SessionMode::Defensive);
        assert!(session
            .connection()
            .execute("INSERT INTO t DEFAULT VALUES", [])
            .is_err());
    }

    #[test]
    fn live_mode_allows_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("live.sqlite");
        let session = Session::open_live(&path).unwrap();
        assert_eq!(session.mode, SessionMode::Live);
        session
            .connection()
            .execute_batch("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        session
            .connection()
            .execute("INSERT INTO t(v) VALUES ('x')", [])
            .unwrap();
        assert!(session.integrity_check().unwrap());
    }
}
