use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CustomerId = i64;

/// A tenant, authenticated by its shared-secret token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Lifecycle of an uploaded file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[default]
    Processing,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Processing => "Processing",
        }
    }
}

/// Metadata for an uploaded file. The blob lives at `{customer_id}/{uuid}.{ext}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: i64,
    pub uuid: String,
    pub file_name: String,
    pub status: UploadStatus,
    pub timestamp: DateTime<Utc>,
    pub customer_id: CustomerId,

    // Soft delete (not yet set by any operation)
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

/// An upload about to be committed; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub uuid: String,
    pub file_name: String,
    pub customer_id: CustomerId,
    pub timestamp: DateTime<Utc>,
}

/// Metadata for the artifact derived from an upload.
/// The blob lives at `{customer_id}/processed/{uuid}.{ext}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: i64,
    pub upload_record_id: i64,
    pub customer_id: CustomerId,
    /// Download name, e.g. `report_processed.csv`
    pub name: String,
    pub uuid: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProcessed {
    pub upload_record_id: i64,
    pub customer_id: CustomerId,
    pub name: String,
    pub uuid: String,
    pub timestamp: DateTime<Utc>,
}

impl NewUpload {
    pub(super) fn to_record(&self, id: i64) -> UploadRecord {
        UploadRecord {
            id,
            uuid: self.uuid.clone(),
            file_name: self.file_name.clone(),
            status: UploadStatus::default(),
            timestamp: self.timestamp,
            customer_id: self.customer_id,
            deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }
}

impl NewProcessed {
    pub(super) fn to_record(&self, id: i64) -> ProcessedRecord {
        ProcessedRecord {
            id,
            upload_record_id: self.upload_record_id,
            customer_id: self.customer_id,
            name: self.name.clone(),
            uuid: self.uuid.clone(),
            timestamp: self.timestamp,
        }
    }
}
