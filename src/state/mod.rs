/// Wall-clock source in the listing offset.
pub mod clock;
pub mod group_id;
/// Per-listing serialization.
pub mod locks;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    dao::listing_store::ListingStore, jobs::JobQueue, platform::ChatPlatform, state::clock::Clock,
    state::locks::ListingLocks,
};

/// Handle passed to every service and handler.
pub type SharedState = Arc<AppState>;

/// Concurrent listings processed by one sweep when nothing else is configured.
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 8;

/// Runtime knobs the services read.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Channel holding the public announcements (`@handle` or numeric id).
    pub announcement_channel: Option<String>,
    /// Upper bound of listings processed concurrently by a sweep.
    pub sweep_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            announcement_channel: None,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }
}

/// Collaborators and in-process coordination shared by every trigger.
pub struct AppState {
    store: Arc<dyn ListingStore>,
    platform: Arc<dyn ChatPlatform>,
    jobs: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    locks: ListingLocks,
    settings: Settings,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Assemble the shared state from its collaborators.
    pub fn new(
        store: Arc<dyn ListingStore>,
        platform: Arc<dyn ChatPlatform>,
        jobs: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> SharedState {
        let (degraded, _rx) = watch::channel(false);
        Arc::new(Self {
            store,
            platform,
            jobs,
            clock,
            locks: ListingLocks::new(),
            settings,
            degraded,
        })
    }

    /// Persistent listing store.
    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// Chat platform used for messages and membership queries.
    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Delayed notification jobs.
    pub fn jobs(&self) -> &Arc<dyn JobQueue> {
        &self.jobs
    }

    /// Time source for schedules and expiry.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Per-listing mutual exclusion for read-modify-write sequences.
    pub fn locks(&self) -> &ListingLocks {
        &self.locks
    }

    /// Runtime knobs.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
