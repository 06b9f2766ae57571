use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::dao::models::ListingId;

/// Registry of per-listing mutexes linearising read-modify-write sequences.
///
/// Unrelated listings never contend; entries disappear once nobody holds or
/// waits on them.
#[derive(Default)]
pub struct ListingLocks {
    slots: DashMap<ListingId, Arc<Mutex<()>>>,
}

/// Exclusive access to a single listing for the lifetime of the guard.
pub struct ListingGuard<'a> {
    registry: &'a ListingLocks,
    id: ListingId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ListingLocks {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the listing is free and take it.
    pub async fn lock(&self, id: &ListingId) -> ListingGuard<'_> {
        let slot = self
            .slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        ListingGuard {
            registry: self,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    /// Number of listings currently tracked.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no listing is currently locked or awaited.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Drop for ListingGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the registry and this (now released) guard referenced the slot.
        self.registry
            .slots
            .remove_if(&self.id, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_listing_is_serialised() {
        let locks = Arc::new(ListingLocks::new());
        let id = ListingId::from("game-1");
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = locks.lock(&id).await;
        let task = {
            let locks = locks.clone();
            let order = order.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&id).await;
                order.lock().unwrap().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().unwrap().push("first");
        drop(first);
        task.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_listings_do_not_block() {
        let locks = ListingLocks::new();
        let _a = locks.lock(&ListingId::from("a")).await;
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock(&ListingId::from("b")),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
