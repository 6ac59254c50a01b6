//! Shared test helpers for in-crate tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::blob_store::{BlobDir, BlobKey, BlobReader, BlobStore, BlobStoreError, LocalStore};
use crate::config::{Config, ServerConfig, StorageConfig};
use crate::naming::{IdGenerator, UuidGenerator};
use crate::storage::models::Customer;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and local blob store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with_ids(temp_dir, Arc::new(UuidGenerator))
}

pub fn test_state_with_store(
    temp_dir: &tempfile::TempDir,
    blob_store: Arc<dyn BlobStore>,
) -> Arc<AppState> {
    test_state_with(temp_dir, blob_store, Arc::new(UuidGenerator))
}

/// Local blob store with ids handed out by `ids`.
pub fn test_state_with_ids(
    temp_dir: &tempfile::TempDir,
    ids: Arc<dyn IdGenerator>,
) -> Arc<AppState> {
    let files_dir = temp_dir.path().join("files");
    let store = LocalStore::new(&files_dir).expect("Failed to create test blob store");
    test_state_with(temp_dir, Arc::new(store), ids)
}

pub fn test_state_with(
    temp_dir: &tempfile::TempDir,
    blob_store: Arc<dyn BlobStore>,
    ids: Arc<dyn IdGenerator>,
) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            upload_root: files_dir.to_string_lossy().to_string(),
        },
        max_upload_size: 1024 * 1024, // 1MB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");

    Arc::new(AppState {
        config,
        db,
        blob_store,
        ids,
    })
}

/// Create a customer with a known token.
pub fn seed_customer(state: &AppState, name: &str, token: &str) -> Customer {
    let token = token.to_string();
    let (customer, _) = state
        .db
        .ensure_customer(name, move || token)
        .expect("Failed to seed customer");
    customer
}

/// A blob store whose writes always fail; reads see an empty store.
pub struct FailingStore;

#[async_trait]
impl BlobStore for FailingStore {
    async fn put(&self, _key: &BlobKey, _data: Bytes) -> Result<(), BlobStoreError> {
        Err(BlobStoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    async fn open(&self, key: &BlobKey) -> Result<BlobReader, BlobStoreError> {
        Err(BlobStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &BlobKey) -> Result<(), BlobStoreError> {
        Ok(())
    }

    async fn list(&self, _dir: &BlobDir) -> Result<Vec<BlobKey>, BlobStoreError> {
        Ok(Vec::new())
    }
}

/// Hands out the given ids in order, then random ones.
pub struct ScriptedIds(Mutex<VecDeque<String>>);

impl ScriptedIds {
    pub fn new(ids: &[&str]) -> Self {
        Self(Mutex::new(ids.iter().map(|id| id.to_string()).collect()))
    }
}

impl IdGenerator for ScriptedIds {
    fn generate(&self) -> String {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| UuidGenerator.generate())
    }
}

/// A local store whose writes stop halfway: the first half of the data lands
/// on disk and the write then reports an I/O error.
pub struct PartialWriteStore(pub LocalStore);

#[async_trait]
impl BlobStore for PartialWriteStore {
    async fn put(&self, key: &BlobKey, data: Bytes) -> Result<(), BlobStoreError> {
        self.0.put(key, data.slice(..data.len() / 2)).await?;
        Err(BlobStoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "connection reset",
        )))
    }

    async fn open(&self, key: &BlobKey) -> Result<BlobReader, BlobStoreError> {
        self.0.open(key).await
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), BlobStoreError> {
        self.0.delete(key).await
    }

    async fn list(&self, dir: &BlobDir) -> Result<Vec<BlobKey>, BlobStoreError> {
        self.0.list(dir).await
    }
}
