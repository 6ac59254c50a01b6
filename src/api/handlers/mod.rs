mod health;
mod results;
mod uploads;

pub use health::health;
pub use results::get_results;
pub use uploads::{file_status, upload_file};

use bytes::Bytes;

use crate::blob_store::{BlobKey, BlobStoreError};
use crate::AppState;

/// Write a blob this request owns. A failed write is cleaned up, except when
/// the key was already taken: that blob belongs to someone else.
async fn put_owned(state: &AppState, key: &BlobKey, data: Bytes) -> Result<(), BlobStoreError> {
    match state.blob_store.put(key, data).await {
        Ok(()) => Ok(()),
        Err(e @ BlobStoreError::AlreadyExists(_)) => {
            tracing::error!(blob = %key, "Generated id collides with an existing blob");
            Err(e)
        }
        Err(e) => {
            discard(state, key).await;
            Err(e)
        }
    }
}

/// Remove a blob written by this request that no record will point at.
async fn discard(state: &AppState, key: &BlobKey) {
    if let Err(e) = state.blob_store.delete(key).await {
        tracing::error!(blob = %key, error = %e, "Failed to remove unreferenced blob");
    }
}
