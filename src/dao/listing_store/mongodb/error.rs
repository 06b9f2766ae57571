use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::models::ListingId;

/// Result alias for the MongoDB backend.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB backend, converted into `StorageError` at the trait boundary.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load listing `{id}`")]
    LoadListing {
        id: ListingId,
        #[source]
        source: MongoError,
    },
    #[error("failed to look up listing for group `{group}`")]
    LoadByGroup {
        group: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list open listings")]
    ListOpen {
        #[source]
        source: MongoError,
    },
    #[error("failed to update listing `{id}`")]
    UpdateListing {
        id: ListingId,
        #[source]
        source: MongoError,
    },
    #[error("listing `{id}` does not exist")]
    MissingListing { id: ListingId },
}
