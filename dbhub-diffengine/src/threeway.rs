//! Three-way merge (§4.2c). Computes `diff(L, H_dest, NoMerge)` and
//! `diff(L, H_src, NewPkMerge)` and detects conflicts before applying the
//! source's SQL onto a copy of the destination file.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::diff::{diff, synthesise_merge_sql, DatabaseDiff};
use crate::error::DiffResult;
use crate::merge::MergeStrategy;
use crate::rowdiff::RowAction;
use crate::schema::SchemaAction;

/// One object (table name, or a schema-level object name) both sides
/// changed incompatibly.
#[derive(Debug, Clone)]
pub struct MergeConflict {
    pub object: String,
    pub reason: String,
}

/// Outcome of [`three_way_merge`].
pub enum MergeOutcome {
    /// Fast-forward: the source's parent equals the destination head, so no
    /// file bytes were touched; the caller should simply append commits.
    FastForward,
    /// A new merged file was produced at this path.
    Merged(PathBuf),
    /// Conflicts were found; nothing was written.
    Conflicts(Vec<MergeConflict>),
}

/// `is_fast_forward`: true when `src_parent == dest_head`, per §4.2c's
/// fast-forward shortcut.
pub fn is_fast_forward(src_parent: &str, dest_head: &str) -> bool {
    src_parent == dest_head
}

fn drop_object(conn: &Connection, change: &crate::schema::SchemaChange) -> DiffResult<()> {
    let keyword = match change.kind {
        crate::schema::ObjectKind::Table => "TABLE",
        crate::schema::ObjectKind::View => "VIEW",
        crate::schema::ObjectKind::Index => "INDEX",
        crate::schema::ObjectKind::Trigger => "TRIGGER",
    };
    conn.execute_batch(&format!(
        "DROP {keyword} IF EXISTS {}",
        dbhub_sqlite_session::escape::quote_identifier(&change.name)
    ))?;
    Ok(())
}

/// Whether `diff` touched `name` at all, as a schema change or as a
/// non-empty data diff.
fn touches(diff: &DatabaseDiff, name: &str) -> bool {
    diff.schema_changes.iter().any(|c| c.name == name)
        || diff.table_diffs.iter().any(|(t, rows)| t == name && !rows.is_empty())
}

fn conflicts_between(dest_diff: &DatabaseDiff, src_diff: &DatabaseDiff) -> Vec<MergeConflict> {
    let mut conflicts = Vec::new();
    let mut flagged = std::collections::HashSet::new();

    // §4.2c (a): a schema change on one side conflicts with anything the
    // other side did to the same object, not just a matching schema change.
    for dest_change in &dest_diff.schema_changes {
        if touches(src_diff, &dest_change.name) && flagged.insert(dest_change.name.clone()) {
            conflicts.push(MergeConflict {
                object: dest_change.name.clone(),
                reason: "schema changed on one side while the other side touched the same object".to_string(),
            });
        }
    }
    for src_change in &src_diff.schema_changes {
        if touches(dest_diff, &src_change.name) && flagged.insert(src_change.name.clone()) {
            conflicts.push(MergeConflict {
                object: src_change.name.clone(),
                reason: "schema changed on one side while the other side touched the same object".to_string(),
            });
        }
    }

    // §4.2c (b): both sides touched the same row of a table neither side
    // schema-changed; the source's own `add` under NewPkMerge never
    // collides since it gets a new PK.
    for (table, dest_rows) in &dest_diff.table_diffs {
        if flagged.contains(table) {
            continue;
        }
        let src_rows = match src_diff.table_diffs.iter().find(|(t, _)| t == table) {
            Some((_, rows)) => rows,
            None => continue,
        };
        for dest_row in dest_rows {
            for src_row in src_rows {
                if dest_row.pk != src_row.pk {
                    continue;
                }
                if src_row.action != RowAction::Add {
                    conflicts.push(MergeConflict {
                        object: table.clone(),
                        reason: format!("both sides modified row with pk {:?}", dest_row.pk),
                    });
                }
            }
        }
    }

    conflicts
}

/// Performs the non-fast-forward three-way merge described in §4.2c. On
/// success, copies `dest_path` to a new file and applies every source
/// schema/data SQL statement under a live session there.
pub fn three_way_merge(
    ancestor_path: &Path,
    dest_path: &Path,
    src_path: &Path,
    output_path: &Path,
) -> DiffResult<MergeOutcome> {
    let dest_diff = diff(ancestor_path, dest_path)?;
    let src_diff = diff(ancestor_path, src_path)?;

    let conflicts = conflicts_between(&dest_diff, &src_diff);
    if !conflicts.is_empty() {
        return Ok(MergeOutcome::Conflicts(conflicts));
    }

    fs::copy(dest_path, output_path)?;

    // Apply source schema SQL (tables first, triggers last — already the
    // order diff_schema returns).
    let conn = Connection::open(output_path)?;
    for change in &src_diff.schema_changes {
        match change.action {
            SchemaAction::Added => {
                if let Some(sql) = &change.new_sql {
                    conn.execute_batch(sql)?;
                }
            }
            SchemaAction::Modified => {
                // The object already exists under the old definition; drop
                // it before recreating it under the new one.
                drop_object(&conn, change)?;
                if let Some(sql) = &change.new_sql {
                    conn.execute_batch(sql)?;
                }
            }
            SchemaAction::Removed => drop_object(&conn, change)?,
        }
    }

    let merge_sql = synthesise_merge_sql(src_path, &src_diff, MergeStrategy::NewPkMerge)?;
    for statement in merge_sql {
        conn.execute_batch(&statement)?;
    }

    Ok(MergeOutcome::Merged(output_path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection as RawConnection;
    use tempfile::tempdir;

    fn file_db(dir: &tempfile::TempDir, name: &str, sql: &str) -> PathBuf {
        let path = dir.path().join(name);
        let conn = RawConnection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        path
    }

    #[test]
    fn fast_forward_detection() {
        assert!(is_fast_forward("abc", "abc"));
        assert!(!is_fast_forward("abc", "def"));
    }

    #[test]
    fn non_conflicting_merge_applies_source_changes() {
        let dir = tempdir().unwrap();
        let ancestor = file_db(&dir, "l.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)");
        let dest = file_db(&dir, "dest.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)");
        let src = file_db(
            &dir,
            "src.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); INSERT INTO t VALUES (1, 'x')",
        );
        let out = dir.path().join("merged.sqlite");

        match three_way_merge(&ancestor, &dest, &src, &out).unwrap() {
            MergeOutcome::Merged(path) => {
                let conn = RawConnection::open(path).unwrap();
                let count: i64 = conn.query_row("SELECT count(*) FROM t", [], |r| r.get(0)).unwrap();
                assert_eq!(count, 1);
            }
            _ => panic!("expected a merged result"),
        }
    }

    #[test]
    fn merge_of_a_newly_added_table_carries_its_rows() {
        let dir = tempdir().unwrap();
        let ancestor = file_db(&dir, "l.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)");
        let dest = file_db(&dir, "dest.sqlite", "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)");
        let src = file_db(
            &dir,
            "src.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); \
             CREATE TABLE extra(id INTEGER PRIMARY KEY, label TEXT); \
             INSERT INTO extra VALUES (1, 'x')",
        );
        let out = dir.path().join("merged.sqlite");

        match three_way_merge(&ancestor, &dest, &src, &out).unwrap() {
            MergeOutcome::Merged(path) => {
                let conn = RawConnection::open(path).unwrap();
                let count: i64 = conn.query_row("SELECT count(*) FROM extra", [], |r| r.get(0)).unwrap();
                assert_eq!(count, 1);
            }
            _ => panic!("expected a merged result"),
        }
    }

    #[test]
    fn conflicting_row_changes_abort() {
        let dir = tempdir().unwrap();
        let ancestor = file_db(
            &dir,
            "l.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); INSERT INTO t VALUES (1, 'orig')",
        );
        let dest = file_db(
            &dir,
            "dest.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); INSERT INTO t VALUES (1, 'dest-edit')",
        );
        let src = file_db(
            &dir,
            "src.sqlite",
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT); INSERT INTO t VALUES (1, 'src-edit')",
        );
        let out = dir.path().join("merged.sqlite");

        match three_way_merge(&ancestor, &dest, &src, &out).unwrap() {
            MergeOutcome::Conflicts(conflicts) => assert_eq!(conflicts.len(), 1),
            _ => panic!("expected a conflict"),
        }
    }
}
