//! Commit, tree and branch types (§3) and their canonical hashing rules.
//!
//! Both `Commit::compute_id` and `Tree::compute_id` are pure functions over
//! the struct's fields; nothing here touches I/O. The DAO surface (§4.7) is
//! responsible for persistence, this crate only defines what a valid id is.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 64 lower-case hex characters (§6 "Commit ID format").
pub type ObjectId = String;

fn sha256_hex(bytes: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEntryType {
    Tree,
    Db,
    Licence,
}

impl TreeEntryType {
    fn as_str(&self) -> &'static str {
        match self {
            TreeEntryType::Tree => "tree",
            TreeEntryType::Db => "db",
            TreeEntryType::Licence => "licence",
        }
    }
}

/// One entry of a `Tree` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub entry_type: TreeEntryType,
    pub name: String,
    pub sha256: ObjectId,
    pub licence_sha: ObjectId,
    /// RFC3339-formatted timestamp, exactly as hashed.
    pub last_modified: String,
    pub size: u64,
}

/// A snapshot manifest: an ordered list of entries (§3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// `sha256` of the concatenation, per entry, of
    /// `type \0 licence_sha \0 sha256 \0 name \0 last_modified \0 size\n`.
    pub fn compute_id(&self) -> ObjectId {
        let mut buf = Vec::new();
        for e in &self.entries {
            buf.extend_from_slice(e.entry_type.as_str().as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.licence_sha.as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.sha256.as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.name.as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.last_modified.as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.size.to_string().as_bytes());
            buf.push(b'\n');
        }
        sha256_hex(&buf)
    }
}

/// An immutable commit (§3). `id` must equal `compute_id()` (invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    /// Additional parents for a merge commit, in order after `parent`.
    pub other_parents: Vec<ObjectId>,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub message: String,
    /// Seconds since epoch, matching the `author <name> <email> <ts>` line.
    pub timestamp: i64,
    pub tree: ObjectId,
}

impl Commit {
    /// Recompute the commit id from the current field values.
    ///
    /// Byte layout: `tree <id>\n`, one `parent <id>\n` line per entry in
    /// `parent` followed by `other_parents` (git's own convention for merge
    /// commits, applied here since §3 only specifies the single-parent
    /// case), `author <name> <email> <ts>\n`, an optional
    /// `committer <name> <email> <ts>\n` line, a blank line, the message,
    /// then a NUL terminator.
    pub fn compute_id(&self) -> ObjectId {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("tree {}\n", self.tree).as_bytes());

        for parent in self.parent.iter().chain(self.other_parents.iter()) {
            buf.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }

        buf.extend_from_slice(
            format!(
                "author {} {} {}\n",
                self.author_name, self.author_email, self.timestamp
            )
            .as_bytes(),
        );

        if let (Some(name), Some(email)) = (&self.committer_name, &self.committer_email) {
            buf.extend_from_slice(format!("committer {name} {email} {}\n", self.timestamp).as_bytes());
        }

        buf.push(b'\n');
        buf.extend_from_slice(self.message.as_bytes());
        buf.push(0);

        sha256_hex(&buf)
    }

    /// The invariant from §3: the stored id must match the recomputed one.
    pub fn id_is_valid(&self) -> bool {
        self.id == self.compute_id()
    }
}

/// A named pointer into the commit history (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: ObjectId,
    pub commit_count: u64,
    pub description: Option<String>,
}

impl Branch {
    /// Check the commit_count invariant against the first-parent chain
    /// reachable from `commits` (a map of id -> commit, as returned by the
    /// metadata DAO's `GetCommitList`).
    pub fn commit_count_is_valid(
        &self,
        commits: &std::collections::HashMap<ObjectId, Commit>,
    ) -> bool {
        let mut count = 0u64;
        let mut cursor = Some(self.commit.clone());
        while let Some(id) = cursor {
            let Some(commit) = commits.get(&id) else {
                return false;
            };
            count += 1;
            cursor = commit.parent.clone().filter(|p| !p.is_empty());
        }
        count == self.commit_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_id_is_deterministic() {
        let tree = Tree {
            entries: vec![TreeEntry {
                entry_type: TreeEntryType::Db,
                name: "test.sqlite".to_string(),
                sha256: "0".repeat(64),
                licence_sha: String::new(),
                last_modified: "2006-01-02T15:04:05Z".to_string(),
                size: 4096,
            }],
        };
        let id1 = tree.compute_id();
        let id2 = tree.compute_id();
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 64);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn commit_id_is_stable_across_recomputation() {
        let commit = Commit {
            id: String::new(),
            parent: None,
            other_parents: vec![],
            author_name: "Joe Bloggs".to_string(),
            author_email: "joe@example.org".to_string(),
            committer_name: None,
            committer_email: None,
            message: "hi".to_string(),
            timestamp: 1136214245, // Mon Jan 2 15:04:05 MST 2006
            tree: "0".repeat(64),
        };
        let id1 = commit.compute_id();
        let id2 = commit.compute_id();
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn commit_id_changes_when_message_changes() {
        let base = Commit {
            id: String::new(),
            parent: None,
            other_parents: vec![],
            author_name: "a".to_string(),
            author_email: "a@example.org".to_string(),
            committer_name: None,
            committer_email: None,
            message: "one".to_string(),
            timestamp: 0,
            tree: "0".repeat(64),
        };
        let mut other = base.clone();
        other.message = "two".to_string();
        assert_ne!(base.compute_id(), other.compute_id());
    }

    #[test]
    fn id_is_valid_detects_tampering() {
        let mut commit = Commit {
            id: String::new(),
            parent: None,
            other_parents: vec![],
            author_name: "a".to_string(),
            author_email: "a@example.org".to_string(),
            committer_name: None,
            committer_email: None,
            message: "m".to_string(),
            timestamp: 0,
            tree: "0".repeat(64),
        };
        commit.id = commit.compute_id();
        assert!(commit.id_is_valid());
        commit.message = "tampered".to_string();
        assert!(!commit.id_is_valid());
    }

    #[test]
    fn branch_commit_count_validates_first_parent_chain() {
        let root = Commit {
            id: "root".to_string(),
            parent: None,
            other_parents: vec![],
            author_name: "a".to_string(),
            author_email: "a@example.org".to_string(),
            committer_name: None,
            committer_email: None,
            message: "root".to_string(),
            timestamp: 0,
            tree: "0".repeat(64),
        };
        let child = Commit {
            id: "child".to_string(),
            parent: Some("root".to_string()),
            other_parents: vec![],
            author_name: "a".to_string(),
            author_email: "a@example.org".to_string(),
            committer_name: None,
            committer_email: None,
            message: "child".to_string(),
            timestamp: 1,
            tree: "0".repeat(64),
        };
        let mut commits = std::collections::HashMap::new();
        commits.insert(root.id.clone(), root);
        commits.insert(child.id.clone(), child);

        let branch = Branch {
            name: "main".to_string(),
            commit: "child".to_string(),
            commit_count: 2,
            description: None,
        };
        assert!(branch.commit_count_is_valid(&commits));

        let wrong = Branch {
            commit_count: 1,
            ..branch
        };
        assert!(!wrong.commit_count_is_valid(&commits));
    }
}
