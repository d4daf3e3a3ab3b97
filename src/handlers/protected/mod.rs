// handlers/protected/mod.rs - Handlers behind bearer authentication
//
// `require_auth` has already resolved the caller into an `AuthUser` by the
// time any of these run. Ownership checks happen in the services.

pub mod posts;
pub mod taxonomy;
pub mod user;

use crate::error::ApiError;

/// Route ids that are not integers name no record.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::not_found(format!("No record found for id {}", raw)))
}
