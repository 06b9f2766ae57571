/// Rendering and editing of the public listing announcement.
pub mod announcement;
/// Retirement of listings whose time window has elapsed.
pub mod expiry;
/// Health check service.
pub mod health_service;
/// Host-initiated listing actions.
pub mod listing_service;
/// Participant counter maintenance.
pub mod membership;
/// Pre-start notifications.
pub mod scheduler;
/// Storage connectivity watchdog.
pub mod storage_supervisor;

use std::future::Future;

use futures::{StreamExt, stream};
use tracing::{debug, error, warn};

use crate::{
    dao::models::{ListingEntity, ListingId},
    error::LifecycleError,
    state::SharedState,
};

/// Tally of a batch pass over listings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Listings the pass looked at.
    pub examined: usize,
    /// Listings whose stored state changed.
    pub changed: usize,
    /// Listings left alone because nothing had to change.
    pub skipped: usize,
    /// Listings whose step failed; the pass moved on.
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, listing_id: &ListingId, result: Result<bool, LifecycleError>) {
        self.examined += 1;
        match result {
            Ok(true) => self.changed += 1,
            Ok(false) => self.skipped += 1,
            Err(err) => {
                self.failed += 1;
                match &err {
                    LifecycleError::Storage(_) => {
                        error!(listing_id = %listing_id, error = %err, "listing skipped: storage failure")
                    }
                    LifecycleError::DataIntegrity { .. } => {
                        warn!(listing_id = %listing_id, error = %err, "listing skipped: malformed data")
                    }
                    LifecycleError::NotFound(_) => {
                        debug!(listing_id = %listing_id, error = %err, "listing skipped: gone")
                    }
                    _ => warn!(listing_id = %listing_id, error = %err, "listing skipped"),
                }
            }
        }
    }
}

/// Run `op` on every listing with bounded concurrency, isolating failures per listing.
///
/// `op` reports whether it changed the listing.
pub(crate) async fn for_each_listing<F, Fut>(
    state: &SharedState,
    listings: Vec<ListingEntity>,
    op: F,
) -> SweepReport
where
    F: Fn(SharedState, ListingEntity) -> Fut,
    Fut: Future<Output = Result<bool, LifecycleError>>,
{
    let concurrency = state.settings().sweep_concurrency.max(1);
    stream::iter(listings)
        .map(|listing| {
            let id = listing.id.clone();
            let fut = op(state.clone(), listing);
            async move { (id, fut.await) }
        })
        .buffer_unordered(concurrency)
        .fold(SweepReport::default(), |mut report, (id, result)| async move {
            report.record(&id, result);
            report
        })
        .await
}
