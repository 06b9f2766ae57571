/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// In-process backend.
pub mod memory;

use crate::dao::models::{ListingEntity, ListingId, ListingPatch};
use crate::dao::storage::StorageResult;
use crate::state::group_id::GroupId;
use futures::future::BoxFuture;

pub use memory::InMemoryListingStore;

/// Abstraction over the persistence layer holding game listings.
pub trait ListingStore: Send + Sync {
    /// Fetch a listing by id.
    fn get(&self, id: ListingId) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>>;
    /// Every listing whose status is `open`.
    fn query_open(&self) -> BoxFuture<'static, StorageResult<Vec<ListingEntity>>>;
    /// Listing linked to the given chat group, if any.
    fn find_by_group(
        &self,
        group: GroupId,
    ) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>>;
    /// Merge `patch` into the stored listing; fails with `NotFound` when absent.
    fn update(&self, id: ListingId, patch: ListingPatch) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
