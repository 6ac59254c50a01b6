//! Offline maintenance: seeding customers, rotating tokens, and sweeping
//! orphaned blobs. redb holds an exclusive lock on its file, so these run
//! while the server is stopped.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

use crate::blob_store::{BlobDir, BlobKey, BlobStore, BlobStoreError};
use crate::storage::models::{Customer, CustomerId};
use crate::storage::{Database, DatabaseError};

/// Customers created by `seed` when no names are given.
pub const DEFAULT_CUSTOMERS: [&str; 2] = ["Customer One", "Customer Two"];

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    BlobStore(#[from] BlobStoreError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Failed to generate random token")]
    Random,
    #[error("Unknown customer: {0}")]
    UnknownCustomer(CustomerId),
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_token() -> Result<String, AdminError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AdminError::Random)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Debug)]
pub struct SeedOutcome {
    pub customer: Customer,
    pub created: bool,
}

/// Ensure a customer exists, with a token, for every name.
pub fn seed_customers(db: &Database, names: &[String]) -> Result<Vec<SeedOutcome>, AdminError> {
    let mut outcomes = Vec::with_capacity(names.len());
    for name in names {
        let token = generate_token()?;
        let (customer, created) = db.ensure_customer(name, move || token)?;
        tracing::info!(customer_id = customer.id, created, "Seeded customer");
        outcomes.push(SeedOutcome { customer, created });
    }
    Ok(outcomes)
}

pub fn rotate_token(db: &Database, customer_id: CustomerId) -> Result<Customer, AdminError> {
    let token = generate_token()?;
    let customer = db
        .rotate_customer_token(customer_id, &token)?
        .ok_or(AdminError::UnknownCustomer(customer_id))?;
    tracing::info!(customer_id, "Rotated customer token");
    Ok(customer)
}

/// Blobs under a known customer's directories with no record pointing at them.
///
/// These are left behind when the process dies between writing a blob and
/// committing its record.
pub async fn find_orphans(
    db: &Database,
    store: &dyn BlobStore,
) -> Result<Vec<BlobKey>, AdminError> {
    let mut orphans = Vec::new();

    for customer in db.list_customers()? {
        for key in store.list(&BlobDir::Uploads(customer.id)).await? {
            let owned = db
                .get_upload_by_uuid(&key.stem)?
                .is_some_and(|record| record.customer_id == customer.id);
            if !owned {
                orphans.push(key);
            }
        }

        for key in store.list(&BlobDir::Processed(customer.id)).await? {
            let owned = db
                .get_processed_by_uuid(&key.stem)?
                .is_some_and(|record| record.customer_id == customer.id);
            if !owned {
                orphans.push(key);
            }
        }
    }

    Ok(orphans)
}

pub async fn remove_orphans(store: &dyn BlobStore, orphans: &[BlobKey]) -> Result<(), AdminError> {
    for key in orphans {
        store.delete(key).await?;
        tracing::info!(blob = %key, "Removed orphaned blob");
    }
    Ok(())
}
