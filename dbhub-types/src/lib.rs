//! Shared data types for the live-database dispatch core.
//!
//! These types cross every component boundary described in the design: they
//! are serialized into job/response `details` JSON (§6), stored in the
//! metadata DAO (§4.7), and asserted on directly in tests (§8). Keeping them
//! in one crate with no component-specific dependencies avoids a cyclic
//! dependency between the job queue, the dispatch API, and the live-node
//! runtime.

pub mod blob;
pub mod commit;
pub mod job;

pub use blob::BlobAddress;
pub use commit::{Branch, Commit, Tree, TreeEntry, TreeEntryType};
pub use job::{JobDetails, JobId, JobOperation, ResponseDetails};

/// Owner/name pair identifying a database, live or versioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DbIdentity {
    pub owner: String,
    pub name: String,
}

impl DbIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DbIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// `(owner, name)` access level, as stored on a live-DB record (§3).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Private,
    Public,
}
