//! file-intake - A per-customer file intake API
//!
//! Customers upload CSV or JSON files, poll their status, and download a
//! processed artifact derived from each upload:
//! - Per-request customer authentication with bearer tokens
//! - Blobs stored under per-customer directories on the local filesystem
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - REST API with multipart, JSON and raw CSV upload support

pub mod admin;
pub mod api;
pub mod blob_store;
pub mod config;
pub mod naming;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use blob_store::BlobStore;
use config::Config;
use naming::IdGenerator;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub blob_store: Arc<dyn BlobStore>,
    pub ids: Arc<dyn IdGenerator>,
}
