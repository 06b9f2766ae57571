use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dao::models::{ListingEntity, ListingId, ListingPatch},
    error::LifecycleError,
    platform::{MembershipChange, MembershipEvent},
    services::{
        SweepReport,
        announcement::{self, Rendering},
        for_each_listing,
    },
    state::{SharedState, group_id::GroupId},
};

/// Effect of a membership update on the stored counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// The counter moved from `from` to `to`.
    Changed { from: u32, to: u32 },
    /// Nothing was written.
    Unchanged,
}

impl MembershipOutcome {
    /// Whether the counter was written.
    pub fn is_changed(self) -> bool {
        matches!(self, MembershipOutcome::Changed { .. })
    }
}

/// Apply a join/leave notification optimistically.
///
/// Bots and the host (counted from creation) are ignored, so an event naming
/// only them leaves the counter alone.
pub async fn apply_event(
    state: &SharedState,
    event: MembershipEvent,
) -> Result<MembershipOutcome, LifecycleError> {
    let Some(linked) = state.store().find_by_group(event.group).await? else {
        debug!(group = %event.group, "membership change in a group without listing");
        return Ok(MembershipOutcome::Unchanged);
    };

    let _guard = state.locks().lock(&linked.id).await;
    let Some(listing) = state.store().get(linked.id.clone()).await? else {
        return Err(LifecycleError::listing_not_found(&linked.id));
    };
    if !listing.is_open() {
        debug!(listing_id = %listing.id, "membership change on closed listing ignored");
        return Ok(MembershipOutcome::Unchanged);
    }

    let delta = event
        .users
        .iter()
        .filter(|user| !user.is_bot && user.id != listing.host_id)
        .count();
    let delta = u32::try_from(delta).unwrap_or(u32::MAX);
    if delta == 0 {
        debug!(listing_id = %listing.id, change = ?event.change, "only host or bots changed; counter untouched");
        return Ok(MembershipOutcome::Unchanged);
    }

    let old = listing.participant_count;
    let new = match event.change {
        MembershipChange::Joined => old.saturating_add(delta),
        MembershipChange::Left => old.saturating_sub(delta).max(1),
    };

    let outcome = store_count(state, listing, new).await?;
    if let MembershipOutcome::Changed { from, to } = outcome {
        info!(group = %event.group, change = ?event.change, delta, from, to, "participant count updated");
    }
    Ok(outcome)
}

/// Players in the group as seen by the platform: every member except bot administrators.
///
/// When administrators cannot be listed one bot (ours) is assumed. Never below 1.
pub async fn platform_count(state: &SharedState, group: GroupId) -> Result<u32, LifecycleError> {
    let total = state.platform().member_count(group).await?;
    let bots = match state.platform().administrators(group).await {
        Ok(administrators) => {
            let bots = administrators.iter().filter(|member| member.user.is_bot).count();
            u32::try_from(bots).unwrap_or(u32::MAX)
        }
        Err(err) => {
            warn!(%group, error = %err, "could not list administrators; assuming one bot");
            1
        }
    };
    Ok(total.saturating_sub(bots).max(1))
}

/// Overwrite the counter of one listing with the platform-derived count.
pub async fn reconcile_listing(
    state: &SharedState,
    listing_id: &ListingId,
) -> Result<MembershipOutcome, LifecycleError> {
    let _guard = state.locks().lock(listing_id).await;

    let Some(listing) = state.store().get(listing_id.clone()).await? else {
        return Err(LifecycleError::listing_not_found(listing_id));
    };
    if !listing.is_open() {
        return Ok(MembershipOutcome::Unchanged);
    }

    let group = listing
        .group()
        .map_err(|fields| LifecycleError::integrity(&listing.id, fields))?;
    let count = platform_count(state, group).await?;

    let outcome = store_count(state, listing, count).await?;
    if let MembershipOutcome::Changed { from, to } = outcome {
        info!(listing_id = %listing_id, from, to, "participant count reconciled");
    }
    Ok(outcome)
}

/// Reconcile every open listing.
pub async fn reconcile_all(state: &SharedState) -> Result<SweepReport, LifecycleError> {
    let open = state.store().query_open().await?;
    let report = for_each_listing(state, open, |state, listing| async move {
        reconcile_listing(&state, &listing.id)
            .await
            .map(MembershipOutcome::is_changed)
    })
    .await;
    info!(?report, "membership reconciliation finished");
    Ok(report)
}

/// Persist a new counter and refresh the announcement. Caller holds the listing lock.
async fn store_count(
    state: &SharedState,
    mut listing: ListingEntity,
    count: u32,
) -> Result<MembershipOutcome, LifecycleError> {
    let from = listing.participant_count;
    let to = count.max(1);
    if from == to {
        return Ok(MembershipOutcome::Unchanged);
    }

    state
        .store()
        .update(listing.id.clone(), ListingPatch::participant_count(to))
        .await?;
    listing.participant_count = to;

    announcement::sync(state, &listing, Rendering::Live).await;
    Ok(MembershipOutcome::Changed { from, to })
}

/// Apply membership events as they arrive, one task per event.
pub async fn run_event_consumer(state: SharedState, mut events: mpsc::Receiver<MembershipEvent>) {
    while let Some(event) = events.recv().await {
        let state = state.clone();
        tokio::spawn(async move {
            let group = event.group;
            if let Err(err) = apply_event(&state, event).await {
                warn!(%group, error = %err, "membership change not applied");
            }
        });
    }
    info!("membership event stream closed");
}
