use tracing::{debug, error, info};

use crate::{
    dao::models::{ListingId, ListingPatch, ListingStatus},
    error::LifecycleError,
    services::{
        SweepReport,
        announcement::{self, Rendering},
        for_each_listing, scheduler,
    },
    state::SharedState,
};

/// Close one listing if its end time has passed. Returns whether it was closed.
pub async fn expire_listing(state: &SharedState, listing_id: &ListingId) -> Result<bool, LifecycleError> {
    let _guard = state.locks().lock(listing_id).await;

    let Some(mut listing) = state.store().get(listing_id.clone()).await? else {
        return Err(LifecycleError::listing_not_found(listing_id));
    };
    if !listing.is_open() {
        return Ok(false);
    }

    let ends_at = listing
        .ends_at(state.clock().offset())
        .map_err(|fields| LifecycleError::integrity(listing_id, fields))?;
    let now = state.clock().now();
    if now <= ends_at {
        debug!(listing_id = %listing_id, %ends_at, "listing still running");
        return Ok(false);
    }

    state
        .store()
        .update(listing_id.clone(), ListingPatch::status(ListingStatus::Closed))
        .await?;
    listing.status = ListingStatus::Closed;
    info!(listing_id = %listing_id, %ends_at, "listing expired");

    scheduler::cancel(state, listing_id);
    announcement::sync(state, &listing, Rendering::Expired).await;
    Ok(true)
}

/// Close every open listing whose time window has elapsed.
pub async fn sweep(state: &SharedState) -> Result<SweepReport, LifecycleError> {
    let open = state.store().query_open().await?;
    let report = for_each_listing(state, open, |state, listing| async move {
        expire_listing(&state, &listing.id).await
    })
    .await;
    info!(?report, "expiry sweep finished");
    Ok(report)
}

/// Periodic entry point: a failed listing query only skips this tick.
pub async fn run_sweep(state: SharedState) {
    if let Err(err) = sweep(&state).await {
        error!(error = %err, "expiry sweep could not list open listings");
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::testing::{Harness, listing};

    #[tokio::test]
    async fn elapsed_listing_is_closed_and_marked_expired() {
        let harness = Harness::new(datetime!(2026-03-05 16:01 +8));
        harness.store.insert(listing("g1"));

        let report = sweep(&harness.state).await.unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(harness.stored("g1").status, ListingStatus::Closed);
        let edited = harness.platform.last_edit().unwrap();
        assert!(edited.text.contains("EXPIRED"));
        assert!(edited.join_button.is_none());
    }

    #[tokio::test]
    async fn end_time_itself_is_not_expired() {
        let harness = Harness::new(datetime!(2026-03-05 16:00 +8));
        harness.store.insert(listing("g1"));

        let report = sweep(&harness.state).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(harness.stored("g1").status, ListingStatus::Open);
        assert!(harness.platform.last_edit().is_none());
    }

    #[tokio::test]
    async fn expired_listing_is_closed_by_exactly_one_pass() {
        let harness = Harness::new(datetime!(2026-03-05 18:00 +8));
        harness.store.insert(listing("g1"));

        let first = sweep(&harness.state).await.unwrap();
        harness.clock.set(datetime!(2026-03-05 19:00 +8));
        let second = sweep(&harness.state).await.unwrap();

        assert_eq!(first.changed, 1);
        assert_eq!(second.examined, 0);
        assert_eq!(harness.stored("g1").status, ListingStatus::Closed);
        assert_eq!(harness.platform.with_log(|log| log.edits.len()), 1);
    }

    #[tokio::test]
    async fn listing_without_announcement_closes_quietly() {
        let harness = Harness::new(datetime!(2026-03-06 09:00 +8));
        let mut game = listing("g1");
        game.announcement_message_id = None;
        harness.store.insert(game);

        assert!(expire_listing(&harness.state, &ListingId::from("g1")).await.unwrap());
        assert_eq!(harness.stored("g1").status, ListingStatus::Closed);
        assert!(harness.platform.last_edit().is_none());
    }

    #[tokio::test]
    async fn malformed_listing_does_not_stop_the_sweep() {
        let harness = Harness::new(datetime!(2026-03-06 09:00 +8));
        let mut broken = listing("a");
        broken.end_time = None;
        harness.store.insert(broken);
        harness.store.insert(listing("b"));

        let report = sweep(&harness.state).await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                examined: 2,
                changed: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(harness.stored("a").status, ListingStatus::Open);
        assert_eq!(harness.stored("b").status, ListingStatus::Closed);
    }

    #[tokio::test]
    async fn expiry_drops_pending_notifications() {
        let harness = Harness::new(datetime!(2026-03-03 12:00 +8));
        harness.store.insert(listing("g1"));
        scheduler::schedule(&harness.state, &listing("g1")).unwrap();

        harness.clock.set(datetime!(2026-03-05 16:30 +8));
        sweep(&harness.state).await.unwrap();

        assert!(harness.jobs.pending().is_empty());
    }
}
