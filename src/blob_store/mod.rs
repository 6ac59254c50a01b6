mod local;

pub use local::LocalStore;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::storage::models::CustomerId;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("Blob already exists: {0}")]
    AlreadyExists(String),
}

/// A directory of blobs belonging to one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDir {
    /// `{customer_id}/`
    Uploads(CustomerId),
    /// `{customer_id}/processed/`
    Processed(CustomerId),
}

impl BlobDir {
    pub fn relative_path(&self) -> PathBuf {
        match self {
            BlobDir::Uploads(id) => PathBuf::from(id.to_string()),
            BlobDir::Processed(id) => PathBuf::from(id.to_string()).join("processed"),
        }
    }
}

/// Address of one blob: `{dir}/{stem}.{ext}`, where the stem is a generated id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKey {
    pub dir: BlobDir,
    pub stem: String,
    pub ext: String,
}

impl BlobKey {
    pub fn new(dir: BlobDir, stem: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            dir,
            stem: stem.into(),
            ext: ext.into(),
        }
    }

    /// On-disk file name, `{stem}.{ext}`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, self.ext)
    }

    /// Lowercased final extension segment
    pub fn extension(&self) -> String {
        crate::naming::extension_of(&self.file_name())
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.dir.relative_path().display(),
            self.file_name()
        )
    }
}

pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Storage for raw uploads and derived artifacts.
/// Blob names are generated ids -- meaningless without the metadata DB.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a new blob, creating its directory if needed.
    ///
    /// Never replaces an existing blob: an occupied key is `AlreadyExists`.
    /// A failed write leaves nothing behind at `key`.
    async fn put(&self, key: &BlobKey, data: Bytes) -> Result<(), BlobStoreError>;
    async fn open(&self, key: &BlobKey) -> Result<BlobReader, BlobStoreError>;
    /// Remove a blob. Removing a missing blob is not an error.
    async fn delete(&self, key: &BlobKey) -> Result<(), BlobStoreError>;
    /// Every blob in `dir`. A missing directory is empty.
    async fn list(&self, dir: &BlobDir) -> Result<Vec<BlobKey>, BlobStoreError>;

    /// Find the blob in `dir` named `{stem}.*` without knowing its extension.
    ///
    /// Several matches mean an earlier write went wrong; the lexicographically
    /// first file name wins and a warning is logged.
    async fn locate(&self, dir: &BlobDir, stem: &str) -> Result<Option<BlobKey>, BlobStoreError> {
        let mut matches: Vec<BlobKey> = self
            .list(dir)
            .await?
            .into_iter()
            .filter(|key| key.stem == stem)
            .collect();
        matches.sort_by_key(|key| key.file_name());

        if matches.len() > 1 {
            tracing::warn!(
                stem = %stem,
                candidates = matches.len(),
                chosen = %matches[0],
                "Multiple blobs share one id"
            );
        }

        Ok(matches.into_iter().next())
    }
}
