use thiserror::Error;

use crate::{
    dao::{
        models::{FieldProblems, ListingId},
        storage::StorageError,
    },
    jobs::JobError,
    platform::PlatformError,
};

/// Failures of a single lifecycle operation on one listing.
///
/// Guard skips (already sent, no longer open) are reported as outcomes, not errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The listing or its announcement no longer exists.
    #[error("not found: {0}")]
    NotFound(String),
    /// Rate limiting or network trouble talking to the chat platform.
    #[error("transient platform failure")]
    TransientPlatform(#[source] PlatformError),
    /// The listing store could not be reached.
    #[error("storage unavailable")]
    Storage(#[source] StorageError),
    /// The listing lacks fields needed to compute its schedule.
    #[error("listing {listing_id} has missing or malformed fields: {fields}")]
    DataIntegrity {
        listing_id: ListingId,
        fields: FieldProblems,
    },
    /// A notification job could not be registered.
    #[error("failed to schedule notification")]
    Scheduling(#[source] JobError),
}

impl LifecycleError {
    /// Integrity error naming the offending fields of one listing.
    pub fn integrity(listing_id: &ListingId, fields: FieldProblems) -> Self {
        LifecycleError::DataIntegrity {
            listing_id: listing_id.clone(),
            fields,
        }
    }

    /// Not-found error for a listing id.
    pub fn listing_not_found(listing_id: &ListingId) -> Self {
        LifecycleError::NotFound(format!("listing {listing_id}"))
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => LifecycleError::listing_not_found(&id),
            other => LifecycleError::Storage(other),
        }
    }
}

impl From<PlatformError> for LifecycleError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(what) => LifecycleError::NotFound(what),
            other => LifecycleError::TransientPlatform(other),
        }
    }
}

impl From<JobError> for LifecycleError {
    fn from(err: JobError) -> Self {
        LifecycleError::Scheduling(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_is_lifecycle_not_found() {
        let err: LifecycleError = StorageError::NotFound {
            id: ListingId::from("g1"),
        }
        .into();
        assert!(matches!(err, LifecycleError::NotFound(ref what) if what == "listing g1"));
    }

    #[test]
    fn rate_limits_are_transient() {
        let err: LifecycleError = PlatformError::RateLimited { retry_after: None }.into();
        assert!(matches!(err, LifecycleError::TransientPlatform(_)));
    }

    #[test]
    fn integrity_errors_name_fields() {
        let err = LifecycleError::integrity(
            &ListingId::from("g1"),
            FieldProblems(vec!["date", "end_time"]),
        );
        assert_eq!(
            err.to_string(),
            "listing g1 has missing or malformed fields: date, end_time"
        );
    }
}
