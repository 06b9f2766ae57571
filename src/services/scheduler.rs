use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dao::models::{ListingEntity, ListingId, ListingPatch},
    error::LifecycleError,
    jobs::{JobName, NotificationJob, NotificationKind},
    platform::{ChatTarget, OutgoingMessage, PollRequest},
    services::{SweepReport, announcement::title_case, for_each_listing},
    state::SharedState,
};

/// Why a fired notification did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The listing was cancelled or closed after the job was registered.
    NotOpen,
    /// A previous delivery already went out.
    AlreadySent,
}

/// Result of handling a fired notification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The notification went out and its flag is persisted.
    Sent,
    /// Nothing was sent.
    Skipped(SkipReason),
}

fn already_sent(listing: &ListingEntity, kind: NotificationKind) -> bool {
    match kind {
        NotificationKind::Pre24h => listing.reminder_24h_sent,
        NotificationKind::Pre2h => listing.reminder_2h_sent,
    }
}

fn sent_patch(kind: NotificationKind) -> ListingPatch {
    match kind {
        NotificationKind::Pre24h => ListingPatch {
            reminder_24h_sent: Some(true),
            ..ListingPatch::default()
        },
        NotificationKind::Pre2h => ListingPatch {
            reminder_2h_sent: Some(true),
            ..ListingPatch::default()
        },
    }
}

/// Register the pre-start notifications of an open listing.
///
/// Safe to call repeatedly: each job is replaced under its deterministic name.
/// Returns the kinds that ended up registered.
pub fn schedule(
    state: &SharedState,
    listing: &ListingEntity,
) -> Result<Vec<NotificationKind>, LifecycleError> {
    if !listing.is_open() {
        debug!(listing_id = %listing.id, status = listing.status.as_str(), "not scheduling closed listing");
        return Ok(Vec::new());
    }

    let start = listing
        .starts_at(state.clock().offset())
        .map_err(|fields| LifecycleError::integrity(&listing.id, fields))?;
    let now = state.clock().now();

    let mut scheduled = Vec::new();
    for kind in NotificationKind::ALL {
        if already_sent(listing, kind) {
            debug!(listing_id = %listing.id, %kind, "notification already sent");
            continue;
        }

        let fire_at = start - kind.lead_time();
        if fire_at <= now {
            info!(listing_id = %listing.id, %kind, %fire_at, "notification time has passed; not scheduling");
            continue;
        }

        let name = JobName::new(kind, &listing.id);
        state.jobs().cancel_by_name(&name);
        state.jobs().schedule_once(
            name,
            fire_at,
            NotificationJob {
                listing_id: listing.id.clone(),
                kind,
            },
        )?;
        debug!(listing_id = %listing.id, %kind, %fire_at, "notification scheduled");
        scheduled.push(kind);
    }

    Ok(scheduled)
}

/// Remove both pending notifications of a listing. Missing jobs are ignored.
///
/// Returns the kinds that were still pending.
pub fn cancel(state: &SharedState, listing_id: &ListingId) -> Vec<NotificationKind> {
    let removed: Vec<NotificationKind> = NotificationKind::ALL
        .into_iter()
        .filter(|kind| state.jobs().cancel_by_name(&JobName::new(*kind, listing_id)))
        .collect();
    if !removed.is_empty() {
        info!(listing_id = %listing_id, ?removed, "cancelled pending notifications");
    }
    removed
}

/// Deliver a fired notification if the listing still wants it.
///
/// The listing is reloaded under its lock; status and flag are the guard that
/// makes stale or duplicate timers harmless. The flag is written only after
/// the message went out.
pub async fn on_fire(state: &SharedState, job: NotificationJob) -> Result<FireOutcome, LifecycleError> {
    let _guard = state.locks().lock(&job.listing_id).await;

    let Some(listing) = state.store().get(job.listing_id.clone()).await? else {
        return Err(LifecycleError::listing_not_found(&job.listing_id));
    };
    if !listing.is_open() {
        debug!(listing_id = %listing.id, kind = %job.kind, "listing no longer open; skipping notification");
        return Ok(FireOutcome::Skipped(SkipReason::NotOpen));
    }
    if already_sent(&listing, job.kind) {
        debug!(listing_id = %listing.id, kind = %job.kind, "notification already sent; skipping");
        return Ok(FireOutcome::Skipped(SkipReason::AlreadySent));
    }

    let group = listing
        .group()
        .map_err(|fields| LifecycleError::integrity(&listing.id, fields))?;
    let chat = ChatTarget::Group(group);

    state
        .platform()
        .send_message(chat.clone(), OutgoingMessage::markdown(reminder_text(&listing, job.kind)))
        .await?;

    if job.kind == NotificationKind::Pre24h {
        send_attendance_poll(state, &listing, chat).await;
    }

    state
        .store()
        .update(listing.id.clone(), sent_patch(job.kind))
        .await?;
    info!(listing_id = %listing.id, kind = %job.kind, "notification sent");
    Ok(FireOutcome::Sent)
}

/// Post and pin the attendance poll. Failures only lose the poll, not the reminder.
async fn send_attendance_poll(state: &SharedState, listing: &ListingEntity, chat: ChatTarget) {
    let poll = PollRequest {
        question: format!("Can you make it for tomorrow's {} game?", listing.sport),
        options: vec![
            "✅ Yes, I can make it!".to_owned(),
            "❌ No, I cannot make it".to_owned(),
        ],
        anonymous: false,
        multiple_answers: false,
    };

    let poll_id = match state.platform().send_poll(chat.clone(), poll).await {
        Ok(poll_id) => poll_id,
        Err(err) => {
            warn!(listing_id = %listing.id, error = %err, "attendance poll could not be sent");
            return;
        }
    };

    if let Err(err) = state.platform().pin_message(chat, poll_id).await {
        warn!(listing_id = %listing.id, error = %err, "attendance poll could not be pinned");
    }
}

fn reminder_text(listing: &ListingEntity, kind: NotificationKind) -> String {
    let date = listing.date.as_deref().unwrap_or("TBC");
    let (header, date_label, footer) = match kind {
        NotificationKind::Pre24h => (
            format!(
                "⏰ *24-Hour Game Reminder!* ⏰\n\n*{}* game is *tomorrow*!",
                listing.sport
            ),
            "Date",
            "See you tomorrow! 🎉",
        ),
        NotificationKind::Pre2h => (
            format!(
                "🚨 *2-Hour Game Alert!* 🚨\n\n*{}* game starts in *2 hours*!",
                listing.sport
            ),
            "Today",
            "Time to get ready! 🏃",
        ),
    };

    format!(
        "{header}\n\n\
         📅 *{date_label}:* {date}\n\
         🕒 *Time:* {window}\n\
         📍 *Venue:* {venue}\n\
         📊 *Skill Level:* {skill}\n\n\
         {footer}",
        window = listing.time_window(),
        venue = listing.venue,
        skill = title_case(&listing.skill),
    )
}

/// Rebuild pending notifications after a restart.
pub async fn recover(state: &SharedState) -> Result<SweepReport, LifecycleError> {
    let pending: Vec<ListingEntity> = state
        .store()
        .query_open()
        .await?
        .into_iter()
        .filter(ListingEntity::needs_reminders)
        .collect();

    let report = for_each_listing(state, pending, |state, listing| async move {
        schedule(&state, &listing).map(|kinds| !kinds.is_empty())
    })
    .await;
    info!(?report, "notification recovery finished");
    Ok(report)
}

/// Handle fired jobs as they arrive, one task per job.
pub async fn run_dispatcher(state: SharedState, mut fired: mpsc::UnboundedReceiver<NotificationJob>) {
    while let Some(job) = fired.recv().await {
        let state = state.clone();
        tokio::spawn(async move {
            let listing_id = job.listing_id.clone();
            let kind = job.kind;
            match on_fire(&state, job).await {
                Ok(FireOutcome::Sent) => {}
                Ok(FireOutcome::Skipped(reason)) => {
                    debug!(listing_id = %listing_id, %kind, ?reason, "notification skipped")
                }
                Err(err) => {
                    warn!(listing_id = %listing_id, %kind, error = %err, "notification failed")
                }
            }
        });
    }
    info!("job queue closed; notification dispatcher stopped");
}
