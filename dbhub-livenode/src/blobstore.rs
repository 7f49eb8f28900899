//! The blob store collaborator (§1 "treated as a put/get key-value store
//! keyed by content hash"): out of scope to implement for real, but the
//! live node needs something to fetch `createdb` blobs from and upload
//! `backup` blobs to. `FsBlobStore` is a local-filesystem stand-in keyed
//! the same way a real object store would be (§3 `bucket = sha[:6]`,
//! `object = sha[6:]`), good enough for tests and a single-box demo.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dbhub_types::BlobAddress;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob {0} not found")]
    NotFound(String),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, sha256: &str) -> BlobStoreResult<Vec<u8>>;
    async fn put(&self, sha256: &str, bytes: Vec<u8>) -> BlobStoreResult<()>;
}

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, sha256: &str) -> BlobStoreResult<PathBuf> {
        let addr = BlobAddress::from_sha256(sha256)
            .ok_or_else(|| BlobStoreError::InvalidHash(sha256.to_string()))?;
        Ok(self.root.join(addr.bucket).join(addr.object))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, sha256: &str) -> BlobStoreResult<Vec<u8>> {
        let path = self.path_for(sha256)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BlobStoreError::NotFound(sha256.to_string()),
                _ => BlobStoreError::Io(e),
            })
    }

    async fn put(&self, sha256: &str, bytes: Vec<u8>) -> BlobStoreResult<()> {
        let path = self.path_for(sha256)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

pub fn sha256_hex_of_file(path: &Path) -> std::io::Result<String> {
    use sha2::{Digest, Sha256};
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
