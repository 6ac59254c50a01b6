use redb::{ReadableTable, WriteTransaction};

use super::db::{next_id, Database, DatabaseError};
use super::models::{CustomerId, NewProcessed, NewUpload, ProcessedRecord, UploadRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // Upload records
    // ========================================================================

    /// Commit a new upload record. The id is assigned here; the uuid must be unused.
    pub fn insert_upload(&self, new: &NewUpload) -> Result<UploadRecord, DatabaseError> {
        debug_assert!(!new.uuid.is_empty(), "upload uuid must not be empty");

        let write_txn = self.begin_write()?;

        let taken = {
            let uuids = write_txn.open_table(UPLOAD_UUIDS)?;
            let result = uuids.get(new.uuid.as_str())?.is_some();
            result
        };
        if taken {
            write_txn.abort()?;
            return Err(DatabaseError::Conflict(format!(
                "upload uuid '{}' already exists",
                new.uuid
            )));
        }

        let id = next_id(&write_txn, "uploads")?;
        let record = new.to_record(id);
        {
            let mut table = write_txn.open_table(UPLOADS)?;
            let data = rmp_serde::to_vec_named(&record)?;
            table.insert(id, data.as_slice())?;

            let mut uuids = write_txn.open_table(UPLOAD_UUIDS)?;
            uuids.insert(record.uuid.as_str(), id)?;
        }
        write_txn.commit()?;
        Ok(record)
    }

    /// Get an upload by uuid regardless of owner or soft-delete state
    pub fn get_upload_by_uuid(&self, uuid: &str) -> Result<Option<UploadRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let uuids = read_txn.open_table(UPLOAD_UUIDS)?;

        let id = match uuids.get(uuid)? {
            Some(data) => data.value(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(UPLOADS)?;
        match table.get(id)? {
            Some(data) => {
                let record: UploadRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Tenant-scoped lookup: another customer's upload and a soft-deleted
    /// upload both come back as `None`.
    pub fn find_upload(
        &self,
        customer_id: CustomerId,
        uuid: &str,
    ) -> Result<Option<UploadRecord>, DatabaseError> {
        Ok(self
            .get_upload_by_uuid(uuid)?
            .filter(|record| record.customer_id == customer_id && !record.deleted))
    }

    // ========================================================================
    // Processed records
    // ========================================================================

    /// The processed record derived from an upload, if one was created
    pub fn find_processed_for_upload(
        &self,
        customer_id: CustomerId,
        upload_id: i64,
    ) -> Result<Option<ProcessedRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(PROCESSED_BY_UPLOAD)?;

        let id = match index.get(upload_id)? {
            Some(data) => data.value(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(PROCESSED)?;
        let record = match table.get(id)? {
            Some(data) => Some(rmp_serde::from_slice::<ProcessedRecord>(data.value())?),
            None => None,
        };
        Ok(record.filter(|r| r.customer_id == customer_id))
    }

    /// Get a processed record by uuid
    pub fn get_processed_by_uuid(
        &self,
        uuid: &str,
    ) -> Result<Option<ProcessedRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let uuids = read_txn.open_table(PROCESSED_UUIDS)?;

        let id = match uuids.get(uuid)? {
            Some(data) => data.value(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(PROCESSED)?;
        match table.get(id)? {
            Some(data) => {
                let record: ProcessedRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Insert a processed record unless its upload already has one.
    ///
    /// Runs in a single write transaction, so concurrent callers for the same
    /// upload serialize here: exactly one inserts, the rest get the winner back.
    /// Returns the stored record and whether this call inserted it.
    pub fn insert_processed_if_absent(
        &self,
        new: &NewProcessed,
    ) -> Result<(ProcessedRecord, bool), DatabaseError> {
        debug_assert!(!new.uuid.is_empty(), "processed uuid must not be empty");

        let write_txn = self.begin_write()?;

        let existing_id = {
            let index = write_txn.open_table(PROCESSED_BY_UPLOAD)?;
            let result = index.get(new.upload_record_id)?.map(|v| v.value());
            result
        };

        if let Some(id) = existing_id {
            let winner = load_processed(&write_txn, id)?;
            write_txn.abort()?;
            return match winner {
                Some(record) => Ok((record, false)),
                None => Err(DatabaseError::Conflict(format!(
                    "processed index points at missing record {id}"
                ))),
            };
        }

        let taken = {
            let uuids = write_txn.open_table(PROCESSED_UUIDS)?;
            let result = uuids.get(new.uuid.as_str())?.is_some();
            result
        };
        if taken {
            write_txn.abort()?;
            return Err(DatabaseError::Conflict(format!(
                "processed uuid '{}' already exists",
                new.uuid
            )));
        }

        let id = next_id(&write_txn, "processed")?;
        let record = new.to_record(id);
        {
            let mut table = write_txn.open_table(PROCESSED)?;
            let data = rmp_serde::to_vec_named(&record)?;
            table.insert(id, data.as_slice())?;

            let mut uuids = write_txn.open_table(PROCESSED_UUIDS)?;
            uuids.insert(record.uuid.as_str(), id)?;

            let mut index = write_txn.open_table(PROCESSED_BY_UPLOAD)?;
            index.insert(record.upload_record_id, id)?;
        }
        write_txn.commit()?;
        Ok((record, true))
    }
}

fn load_processed(
    txn: &WriteTransaction,
    id: i64,
) -> Result<Option<ProcessedRecord>, DatabaseError> {
    let table = txn.open_table(PROCESSED)?;
    let result = match table.get(id)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };
    Ok(result)
}
