//! Per-customer bearer token authentication.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{ToStrError, AUTHORIZATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::api::response::ApiError;
use crate::storage::models::{Customer, CustomerId};
use crate::storage::{Database, DatabaseError};
use crate::AppState;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

const BEARER_SCHEME: &str = "bearer";

/// Why a request was not authenticated. The message is returned to the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing X-Customer-Id header")]
    MissingCustomerId,
    #[error("X-Customer-Id must be an integer")]
    InvalidCustomerId,
    #[error("Missing Authorization header")]
    MissingAuthorization,
    #[error("Malformed Authorization header (expected: 'Bearer <token>')")]
    MalformedAuthorization,
    #[error("Wrong auth scheme (use: Bearer)")]
    WrongScheme,
    #[error("Unknown customer")]
    UnknownCustomer,
    #[error("Invalid token for this customer")]
    InvalidToken,
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(e) => e.into(),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

/// Constant-time comparison of two tokens.
/// Unequal lengths compare unequal.
fn tokens_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Resolve the raw `X-Customer-Id` and `Authorization` header values to a customer.
///
/// Header shape is validated before the store is consulted.
pub fn authenticate(
    db: &Database,
    customer_id: Option<&str>,
    authorization: Option<&str>,
) -> Result<Customer, AuthError> {
    let customer_id: CustomerId = customer_id
        .filter(|raw| !raw.is_empty())
        .ok_or(AuthError::MissingCustomerId)?
        .trim()
        .parse()
        .map_err(|_| AuthError::InvalidCustomerId)?;

    let authorization = authorization
        .filter(|raw| !raw.is_empty())
        .ok_or(AuthError::MissingAuthorization)?;
    let (scheme, presented) = match authorization.split_whitespace().collect::<Vec<_>>()[..] {
        [scheme, token] => (scheme, token),
        _ => return Err(AuthError::MalformedAuthorization),
    };
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::WrongScheme);
    }

    let customer = db
        .get_customer(customer_id)?
        .ok_or(AuthError::UnknownCustomer)?;

    match customer.token.as_deref() {
        Some(stored) if !stored.is_empty() && tokens_match(stored, presented) => Ok(customer),
        _ => Err(AuthError::InvalidToken),
    }
}

/// Extractor for the customer a request is authenticated as.
/// Runs before the body is read, so unauthenticated uploads are never buffered.
#[derive(Debug, Clone)]
pub struct AuthenticatedCustomer(pub Customer);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let customer_id = header_str(&parts.headers, CUSTOMER_ID_HEADER)
            .map_err(|_| AuthError::InvalidCustomerId)?;
        let authorization = header_str(&parts.headers, AUTHORIZATION.as_str())
            .map_err(|_| AuthError::MalformedAuthorization)?;

        match authenticate(&state.db, customer_id, authorization) {
            Ok(customer) => Ok(AuthenticatedCustomer(customer)),
            Err(e) => {
                if !matches!(e, AuthError::Store(_)) {
                    tracing::debug!(reason = %e, "Rejected request");
                }
                Err(e.into())
            }
        }
    }
}

/// A header as text; `Err` if present but not visible ASCII.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ToStrError> {
    headers.get(name).map(HeaderValue::to_str).transpose()
}
