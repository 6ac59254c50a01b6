use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::{discard, put_owned};
use crate::api::auth::AuthenticatedCustomer;
use crate::api::response::{ApiError, AppQuery};
use crate::blob_store::{BlobDir, BlobKey};
use crate::naming::{add_suffix_before_ext, DEFAULT_EXTENSION};
use crate::storage::models::{NewProcessed, ProcessedRecord, UploadRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    #[serde(default)]
    pub uuid: Option<String>,
    /// Older clients send `parent_uuid`
    #[serde(default)]
    pub parent_uuid: Option<String>,
}

/// Derive (once) and download the processed artifact for an upload.
/// Route: GET /get-results?uuid=<parent uuid>
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer): AuthenticatedCustomer,
    AppQuery(params): AppQuery<ResultsParams>,
) -> Result<Response, ApiError> {
    let parent_uuid = params
        .uuid
        .filter(|s| !s.is_empty())
        .or(params.parent_uuid.filter(|s| !s.is_empty()))
        .ok_or_else(|| ApiError::bad_request("Missing query param 'uuid' (parent file UUID)"))?;

    let parent = state
        .db
        .find_upload(customer.id, &parent_uuid)?
        .ok_or_else(|| ApiError::not_found("Parent file not found for this customer"))?;

    let processed = ensure_processed(&state, &parent).await?;

    let key = state
        .blob_store
        .locate(&BlobDir::Processed(customer.id), &processed.uuid)
        .await?
        .ok_or_else(|| {
            tracing::error!(
                customer_id = customer.id,
                processed_id = processed.id,
                uuid = %processed.uuid,
                "Processed record has no blob on disk"
            );
            ApiError::internal("Processed artifact missing on disk")
        })?;

    let reader = state.blob_store.open(&key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    let content_type = mime_guess::from_path(&processed.name).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        content_type
            .essence_str()
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );

    // Download under the display name, not the storage name
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        processed.name.replace('"', "")
    ))
    .map_err(|_| ApiError::internal("Invalid download name"))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

/// Get or create the processed record for `parent`.
///
/// A new artifact is written before its record is committed. When a concurrent
/// request commits first, its record wins and the blob written here is removed.
async fn ensure_processed(
    state: &AppState,
    parent: &UploadRecord,
) -> Result<ProcessedRecord, ApiError> {
    let customer_id = parent.customer_id;

    if let Some(existing) = state.db.find_processed_for_upload(customer_id, parent.id)? {
        return Ok(existing);
    }

    let ext = match state
        .blob_store
        .locate(&BlobDir::Uploads(customer_id), &parent.uuid)
        .await?
    {
        Some(key) => key.extension(),
        None => {
            tracing::warn!(
                customer_id,
                uuid = %parent.uuid,
                "Upload blob not found, deriving as {DEFAULT_EXTENSION}"
            );
            DEFAULT_EXTENSION.to_string()
        }
    };

    let candidate = NewProcessed {
        upload_record_id: parent.id,
        customer_id,
        name: add_suffix_before_ext(&parent.file_name, "processed", Some(&ext)),
        uuid: state.ids.generate(),
        timestamp: Utc::now(),
    };

    let key = BlobKey::new(BlobDir::Processed(customer_id), candidate.uuid.clone(), ext);
    put_owned(state, &key, stub_artifact(&parent.uuid, &key.ext)).await?;

    match state.db.insert_processed_if_absent(&candidate) {
        Ok((record, true)) => {
            tracing::debug!(
                customer_id,
                upload_id = parent.id,
                processed_id = record.id,
                "Created processed record"
            );
            Ok(record)
        }
        Ok((winner, false)) => {
            tracing::debug!(
                upload_id = parent.id,
                processed_id = winner.id,
                "Processed record created concurrently, discarding duplicate artifact"
            );
            discard(state, &key).await;
            Ok(winner)
        }
        Err(e) => {
            discard(state, &key).await;
            Err(e.into())
        }
    }
}

/// Placeholder output proving the pipeline ran.
fn stub_artifact(parent_uuid: &str, ext: &str) -> Bytes {
    if ext == "csv" {
        Bytes::from(format!("parent_uuid,status\n{parent_uuid},OK\n"))
    } else {
        let body = serde_json::json!({
            "parent_uuid": parent_uuid,
            "status": "OK",
            "processed": true,
        });
        Bytes::from(body.to_string())
    }
}
