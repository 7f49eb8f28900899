//! Blob-store addressing (§3, §6).
//!
//! The blob store itself is out of scope (spec §1); this module only
//! defines the deterministic bucket/object split every caller must agree on.

use serde::{Deserialize, Serialize};

/// Maximum size of an uploaded database file, in bytes.
pub const MAX_UPLOADED_DB_BYTES: u64 = 512 * 1024 * 1024;
/// Maximum size of a licence file, in bytes.
pub const MAX_LICENCE_BYTES: u64 = 1024 * 1024;
/// Default number of rows returned by a single `rowdata` page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// `bucket = sha256[:6]`, `object = sha256[6:]` (§3, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobAddress {
    pub bucket: String,
    pub object: String,
}

impl BlobAddress {
    /// Split a 64-hex-character sha256 digest into its bucket/object parts.
    ///
    /// Returns `None` if `sha256` is not exactly 64 hex characters, so
    /// callers can surface a `Validation` error (§7) instead of panicking
    /// on a malformed commit id.
    pub fn from_sha256(sha256: &str) -> Option<Self> {
        if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            bucket: sha256[..6].to_string(),
            object: sha256[6..].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bucket_and_object() {
        let sha = "a".repeat(64);
        let addr = BlobAddress::from_sha256(&sha).unwrap();
        assert_eq!(addr.bucket, "a".repeat(6));
        assert_eq!(addr.object, "a".repeat(58));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(BlobAddress::from_sha256("abc").is_none());
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(BlobAddress::from_sha256(&bad).is_none());
    }
}
