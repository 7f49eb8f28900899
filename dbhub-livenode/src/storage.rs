//! Local filesystem layout for live databases (§4.3): one file per
//! `(owner, name)` under the node's `storage_dir`.

use std::path::{Path, PathBuf};

/// `<storage_dir>/<owner>/<name>/live.sqlite` (§4.3).
pub fn live_db_path(storage_dir: &Path, owner: &str, name: &str) -> PathBuf {
    storage_dir.join(owner).join(name).join("live.sqlite")
}

pub fn owner_dir(storage_dir: &Path, owner: &str) -> PathBuf {
    storage_dir.join(owner)
}

/// Removes the live DB file and its parent `<name>` directory, but leaves
/// the owner directory intact (§4.3 `delete`: "avoid TOCTOU with
/// concurrent DBs of same owner").
pub fn delete_live_db_files(storage_dir: &Path, owner: &str, name: &str) -> std::io::Result<()> {
    let db_dir = storage_dir.join(owner).join(name);
    if db_dir.exists() {
        std::fs::remove_dir_all(&db_dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn live_db_path_nests_owner_then_name() {
        let root = PathBuf::from("/var/dbhub/storage");
        assert_eq!(
            live_db_path(&root, "alice", "data"),
            PathBuf::from("/var/dbhub/storage/alice/data/live.sqlite")
        );
    }

    #[test]
    fn delete_leaves_owner_dir_intact() {
        let dir = tempdir().unwrap();
        let storage = dir.path();
        std::fs::create_dir_all(storage.join("alice").join("data")).unwrap();
        std::fs::write(live_db_path(storage, "alice", "data"), b"x").unwrap();
        std::fs::create_dir_all(storage.join("alice").join("other")).unwrap();

        delete_live_db_files(storage, "alice", "data").unwrap();

        assert!(!storage.join("alice").join("data").exists());
        assert!(storage.join("alice").exists());
        assert!(storage.join("alice").join("other").exists());
    }
}
