use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::{BlobDir, BlobKey, BlobReader, BlobStore, BlobStoreError};

/// Local filesystem blob store: `{base}/{customer_id}/[processed/]{id}.{ext}`.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn dir_path(&self, dir: &BlobDir) -> PathBuf {
        self.base_path.join(dir.relative_path())
    }

    fn object_path(&self, key: &BlobKey) -> PathBuf {
        self.dir_path(&key.dir).join(key.file_name())
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, key: &BlobKey, data: Bytes) -> Result<(), BlobStoreError> {
        tokio::fs::create_dir_all(self.dir_path(&key.dir)).await?;

        let path = self.object_path(key);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BlobStoreError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                tracing::error!(blob = %key, error = %cleanup, "Failed to remove partial blob");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn open(&self, key: &BlobKey) -> Result<BlobReader, BlobStoreError> {
        match tokio::fs::File::open(self.object_path(key)).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), BlobStoreError> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, dir: &BlobDir) -> Result<Vec<BlobKey>, BlobStoreError> {
        let mut entries = match tokio::fs::read_dir(self.dir_path(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some((stem, ext)) = name.split_once('.') {
                if !stem.is_empty() && !ext.is_empty() {
                    keys.push(BlobKey::new(*dir, stem, ext));
                }
            }
        }

        Ok(keys)
    }
}
