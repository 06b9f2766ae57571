use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::SharedState;

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Watch the listing store and keep the shared state's degraded flag current.
///
/// While the store is unhealthy, reconnects are attempted with exponential backoff.
pub async fn run(state: SharedState) {
    let mut delay = INITIAL_DELAY;

    loop {
        match state.store().health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                delay = INITIAL_DELAY;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                if !state.is_degraded() {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                    state.update_degraded(true);
                }
                match state.store().try_reconnect().await {
                    Ok(()) => info!("storage reconnection succeeded"),
                    Err(reconnect_err) => {
                        warn!(error = %reconnect_err, ?delay, "storage reconnect attempt failed")
                    }
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use futures::future::BoxFuture;
    use time::macros::datetime;

    use super::*;
    use crate::{
        dao::{
            listing_store::ListingStore,
            models::{ListingEntity, ListingId, ListingPatch},
            storage::{StorageError, StorageResult},
        },
        state::{AppState, Settings, group_id::GroupId},
        testing::{ManualClock, RecordingJobQueue, RecordingPlatform},
    };

    #[derive(Clone, Default)]
    struct FlakyStore {
        down: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn status(&self) -> StorageResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(StorageError::unavailable(
                    "ping failed".into(),
                    std::io::Error::other("connection reset"),
                ))
            } else {
                Ok(())
            }
        }
    }

    impl ListingStore for FlakyStore {
        fn get(&self, _id: ListingId) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>> {
            Box::pin(async { Ok(None) })
        }

        fn query_open(&self) -> BoxFuture<'static, StorageResult<Vec<ListingEntity>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn find_by_group(
            &self,
            _group: GroupId,
        ) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>> {
            Box::pin(async { Ok(None) })
        }

        fn update(&self, id: ListingId, _patch: ListingPatch) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Err(StorageError::NotFound { id }) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            let result = self.status();
            Box::pin(async move { result })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            let result = self.status();
            Box::pin(async move { result })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn toggles_degraded_mode_with_store_health() {
        let store = FlakyStore::default();
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(RecordingPlatform::new()),
            Arc::new(RecordingJobQueue::default()),
            Arc::new(ManualClock::new(datetime!(2026-03-03 12:00 +8))),
            Settings::default(),
        );
        let mut degraded = state.degraded_watcher();
        let supervisor = tokio::spawn(run(state.clone()));

        store.down.store(true, Ordering::SeqCst);
        degraded.changed().await.unwrap();
        assert!(*degraded.borrow_and_update());

        store.down.store(false, Ordering::SeqCst);
        degraded.changed().await.unwrap();
        assert!(!*degraded.borrow_and_update());

        supervisor.abort();
    }
}
