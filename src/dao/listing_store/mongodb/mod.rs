mod config;
mod connection;
mod error;
mod models;
/// `ListingStore` implementation over the `listings` collection.
pub mod store;

pub use config::{ConnectRetry, MongoConfig};
pub use error::MongoDaoError;
pub use store::MongoListingStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::MissingListing { id } => StorageError::NotFound { id },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
