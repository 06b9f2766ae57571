use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::{
    dao::{
        listing_store::ListingStore,
        models::{ListingEntity, ListingId, ListingPatch},
        storage::{StorageError, StorageResult},
    },
    state::group_id::GroupId,
};

/// Process-local listing store, used for development runs and tests.
#[derive(Clone, Default)]
pub struct InMemoryListingStore {
    listings: Arc<DashMap<ListingId, ListingEntity>>,
}

impl InMemoryListingStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a listing wholesale (creation happens outside the lifecycle core).
    pub fn insert(&self, listing: ListingEntity) {
        self.listings.insert(listing.id.clone(), listing);
    }

    /// Synchronous snapshot of a listing.
    pub fn snapshot(&self, id: &ListingId) -> Option<ListingEntity> {
        self.listings.get(id).map(|entry| entry.value().clone())
    }
}

impl ListingStore for InMemoryListingStore {
    fn get(&self, id: ListingId) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.snapshot(&id)) })
    }

    fn query_open(&self) -> BoxFuture<'static, StorageResult<Vec<ListingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut open = store
                .listings
                .iter()
                .filter(|entry| entry.is_open())
                .map(|entry| entry.value().clone())
                .collect::<Vec<_>>();
            open.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(open)
        })
    }

    fn find_by_group(
        &self,
        group: GroupId,
    ) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            // An open listing wins over terminal ones reusing the same group.
            let mut fallback = None;
            for entry in store.listings.iter() {
                if !entry.group().is_ok_and(|linked| linked == group) {
                    continue;
                }
                if entry.is_open() {
                    return Ok(Some(entry.value().clone()));
                }
                fallback.get_or_insert_with(|| entry.value().clone());
            }
            Ok(fallback)
        })
    }

    fn update(&self, id: ListingId, patch: ListingPatch) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(mut entry) = store.listings.get_mut(&id) else {
                return Err(StorageError::NotFound { id });
            };
            patch.apply_to(entry.value_mut());
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
