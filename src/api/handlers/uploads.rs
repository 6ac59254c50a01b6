use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use mime_guess::mime::{self, Mime};
use serde::Serialize;
use std::sync::Arc;

use super::{discard, put_owned};
use crate::api::auth::AuthenticatedCustomer;
use crate::api::response::ApiError;
use crate::blob_store::{BlobDir, BlobKey};
use crate::naming::{extension_of, is_allowed_extension, sanitize_filename, ALLOWED_EXTENSIONS};
use crate::storage::models::{CustomerId, NewUpload, UploadRecord};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file: UploadedFile,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub id: i64,
    pub uuid: String,
    pub file_name: String,
    pub stored_as: String,
    pub customer_id: CustomerId,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct FileStatusResponse {
    pub uuid: String,
    pub status: String,
    pub file_name: String,
    pub customer_id: CustomerId,
    pub timestamp: String,
}

/// A validated upload payload, whatever shape it arrived in.
struct IncomingFile {
    file_name: String,
    ext: String,
    data: Bytes,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer): AuthenticatedCustomer,
    request: Request,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let incoming = read_payload(&state, request).await?;

    let uuid = state.ids.generate();
    let key = BlobKey::new(BlobDir::Uploads(customer.id), uuid.clone(), incoming.ext);

    // Phase 1: write bytes to the blob store (keyed by the new uuid)
    put_owned(&state, &key, incoming.data).await?;

    // Phase 2: commit the record; on failure the blob must not outlive the request
    let new_upload = NewUpload {
        uuid,
        file_name: incoming.file_name,
        customer_id: customer.id,
        timestamp: Utc::now(),
    };
    let record = match state.db.insert_upload(&new_upload) {
        Ok(record) => record,
        Err(e) => {
            // `put` created the blob, so it is ours to remove
            discard(&state, &key).await;
            return Err(e.into());
        }
    };

    tracing::debug!(
        customer_id = customer.id,
        upload_id = record.id,
        uuid = %record.uuid,
        "Created upload"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File uploaded".to_string(),
            file: UploadedFile {
                id: record.id,
                uuid: record.uuid.clone(),
                file_name: record.file_name.clone(),
                stored_as: key.file_name(),
                customer_id: record.customer_id,
                timestamp: record.timestamp.to_rfc3339(),
            },
        }),
    ))
}

pub async fn file_status(
    State(state): State<Arc<AppState>>,
    AuthenticatedCustomer(customer): AuthenticatedCustomer,
    Path(uuid): Path<String>,
) -> Result<Json<FileStatusResponse>, ApiError> {
    let record = state
        .db
        .find_upload(customer.id, &uuid)?
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    Ok(Json(status_response(&record)))
}

// ============================================================================
// Helpers
// ============================================================================

fn status_response(record: &UploadRecord) -> FileStatusResponse {
    FileStatusResponse {
        uuid: record.uuid.clone(),
        status: record.status.as_str().to_string(),
        file_name: record.file_name.clone(),
        customer_id: record.customer_id,
        timestamp: record.timestamp.to_rfc3339(),
    }
}

fn no_payload() -> ApiError {
    ApiError::bad_request("No file provided. Use multipart 'file', application/json, or text/csv.")
}

fn is_json(content_type: &Mime) -> bool {
    content_type.type_() == mime::APPLICATION
        && (content_type.subtype() == mime::JSON || content_type.suffix() == Some(mime::JSON))
}

fn is_csv(content_type: &Mime) -> bool {
    matches!(content_type.essence_str(), "text/csv" | "application/csv")
}

/// Accept a multipart `file` part, a JSON body, or a raw CSV body.
async fn read_payload(state: &Arc<AppState>, request: Request) -> Result<IncomingFile, ApiError> {
    let content_type: Option<Mime> = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    match content_type {
        Some(ct) if ct.type_() == mime::MULTIPART && ct.subtype() == mime::FORM_DATA => {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text())))?;
            read_multipart(multipart, state.config.max_upload_size).await
        }
        Some(ct) if is_json(&ct) => {
            let body = read_body(state, request).await?;
            let value: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|_| ApiError::bad_request("Malformed JSON in request body"))?;
            let data = serde_json::to_vec(&value)
                .map_err(|_| ApiError::bad_request("Malformed JSON in request body"))?;

            Ok(IncomingFile {
                file_name: "inline.json".to_string(),
                ext: "json".to_string(),
                data: Bytes::from(data),
            })
        }
        Some(ct) if is_csv(&ct) => {
            let body = read_body(state, request).await?;
            if body.is_empty() {
                return Err(no_payload());
            }

            Ok(IncomingFile {
                file_name: "inline.csv".to_string(),
                ext: "csv".to_string(),
                data: body,
            })
        }
        _ => Err(no_payload()),
    }
}

async fn read_body(state: &Arc<AppState>, request: Request) -> Result<Bytes, ApiError> {
    Bytes::from_request(request, state).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large(format!(
                "Body exceeds maximum upload size of {} bytes",
                state.config.max_upload_size
            ))
        } else {
            ApiError::bad_request("Failed to read request body")
        }
    })
}

async fn read_multipart(mut multipart: Multipart, max_size: u64) -> Result<IncomingFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = sanitize_filename(field.file_name().unwrap_or_default());
        if file_name.is_empty() {
            return Err(ApiError::bad_request("File must have a filename"));
        }
        let ext = extension_of(&file_name);
        if !is_allowed_extension(&ext) {
            return Err(ApiError::bad_request(format!(
                "Only {} allowed",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let data = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large(format!(
                    "File exceeds maximum upload size of {max_size} bytes"
                ))
            } else {
                ApiError::bad_request(format!("Failed to read file: {e}"))
            }
        })?;
        if data.len() as u64 > max_size {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {max_size} bytes"
            )));
        }

        return Ok(IncomingFile {
            file_name,
            ext,
            data,
        });
    }

    Err(no_payload())
}
