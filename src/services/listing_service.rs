use tracing::{debug, info};

use crate::{
    dao::models::{ListingId, ListingPatch, ListingStatus},
    error::LifecycleError,
    jobs::NotificationKind,
    services::{
        announcement::{self, Rendering},
        scheduler,
    },
    state::SharedState,
};

/// Result of a host cancelling their listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The listing is now cancelled; `removed_jobs` were still pending.
    Cancelled { removed_jobs: Vec<NotificationKind> },
    /// The listing had already been cancelled or closed.
    AlreadyTerminal(ListingStatus),
}

/// Call off an open listing: mark it cancelled, drop its notifications and
/// replace the announcement with the cancelled face.
pub async fn cancel_listing(
    state: &SharedState,
    listing_id: &ListingId,
) -> Result<CancelOutcome, LifecycleError> {
    let _guard = state.locks().lock(listing_id).await;

    let Some(mut listing) = state.store().get(listing_id.clone()).await? else {
        return Err(LifecycleError::listing_not_found(listing_id));
    };
    if listing.status.is_terminal() {
        debug!(listing_id = %listing_id, status = listing.status.as_str(), "listing already terminal");
        return Ok(CancelOutcome::AlreadyTerminal(listing.status));
    }

    state
        .store()
        .update(listing_id.clone(), ListingPatch::status(ListingStatus::Cancelled))
        .await?;
    listing.status = ListingStatus::Cancelled;
    info!(listing_id = %listing_id, "listing cancelled");

    let removed_jobs = scheduler::cancel(state, listing_id);
    announcement::sync(state, &listing, Rendering::Cancelled).await;
    Ok(CancelOutcome::Cancelled { removed_jobs })
}
