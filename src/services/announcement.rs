use tracing::{debug, info, warn};

use crate::{
    dao::models::ListingEntity,
    platform::{ChatTarget, JoinButton, OutgoingMessage, PlatformError},
    state::SharedState,
};

const JOIN_BUTTON_LABEL: &str = "✋ Join Game";

/// Which face of the listing the announcement shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Open listing with live player count and join button.
    Live,
    /// Time window has elapsed.
    Expired,
    /// Host called the game off.
    Cancelled,
}

/// Result of editing the public announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// New content is live.
    Edited,
    /// The platform already shows this exact content.
    Unchanged,
    /// No announcement reference or no channel configured.
    Skipped,
    /// The announcement was deleted upstream.
    Missing,
    /// The edit failed; the next write to the listing brings it up to date.
    Lagging,
}

/// Render the announcement text for a listing.
pub fn render(listing: &ListingEntity, rendering: Rendering) -> OutgoingMessage {
    let date = listing.date.as_deref().unwrap_or("TBC");
    let window = listing.time_window();

    match rendering {
        Rendering::Live => {
            let mut text = format!(
                "🎮 New {sport} Game!\n\n\
                 📅 Date: {date}\n\
                 🕒 Time: {window}\n\
                 📍 Venue: {venue}\n\
                 📊 Skill Level: {skill}\n\
                 👥 Players: {players}\n\
                 👤 Host: @{host}",
                sport = listing.sport,
                venue = listing.venue,
                skill = title_case(&listing.skill),
                players = listing.participant_count,
                host = listing.host_username.as_deref().unwrap_or("Anonymous"),
            );
            if let Some(link) = listing.group_link.as_deref() {
                text.push_str(&format!("\n\n🔗 Join Group: {link}"));
            }
            let button = listing.group_link.as_ref().map(|link| JoinButton {
                label: JOIN_BUTTON_LABEL.to_owned(),
                url: link.clone(),
            });
            OutgoingMessage::plain(text).with_join_button(button)
        }
        Rendering::Expired => OutgoingMessage::plain(format!(
            "⌛ EXPIRED: {sport} Game at {venue} on {date} {window}\n\n\
             👥 Final players: {players}",
            sport = listing.sport,
            venue = listing.venue,
            players = listing.participant_count,
        )),
        Rendering::Cancelled => OutgoingMessage::plain(format!(
            "❌ CANCELLED: {sport} Game at {venue} on {date} {window}",
            sport = listing.sport,
            venue = listing.venue,
        )),
    }
}

/// Edit the existing announcement so it reflects `listing`.
///
/// Never creates a message and never fails the caller: the listing write that
/// triggered the sync has already been committed.
pub async fn sync(state: &SharedState, listing: &ListingEntity, rendering: Rendering) -> SyncOutcome {
    let Some(message_id) = listing.announcement_message_id else {
        debug!(listing_id = %listing.id, "listing has no announcement; skipping sync");
        return SyncOutcome::Skipped;
    };
    let Some(channel) = state.settings().announcement_channel.clone() else {
        warn!(listing_id = %listing.id, "no announcement channel configured; skipping sync");
        return SyncOutcome::Skipped;
    };

    let message = render(listing, rendering);
    match state
        .platform()
        .edit_message(ChatTarget::Channel(channel), message_id, message)
        .await
    {
        Ok(()) => {
            info!(listing_id = %listing.id, message_id, ?rendering, "announcement updated");
            SyncOutcome::Edited
        }
        Err(PlatformError::NotModified) => {
            debug!(listing_id = %listing.id, message_id, "announcement already up to date");
            SyncOutcome::Unchanged
        }
        Err(PlatformError::NotFound(what)) => {
            warn!(listing_id = %listing.id, message_id, %what, "announcement message is gone");
            SyncOutcome::Missing
        }
        Err(err) => {
            warn!(
                listing_id = %listing.id,
                message_id,
                error = %err,
                "announcement update failed; it will catch up on the next change"
            );
            SyncOutcome::Lagging
        }
    }
}

/// Capitalise the first letter of every word (`"intermediate"` becomes `"Intermediate"`).
pub(crate) fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
