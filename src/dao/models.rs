use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::state::group_id::GroupId;

/// Stable identifier of a listing document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ListingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a listing. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Accepting players; reminders and reconciliation apply.
    Open,
    /// Called off by the host.
    Cancelled,
    /// Time window elapsed.
    Closed,
}

impl ListingStatus {
    /// Whether the listing left the open state for good.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ListingStatus::Open)
    }

    /// Whether moving to `next` respects the forward-only lifecycle.
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Open, ListingStatus::Cancelled | ListingStatus::Closed)
        )
    }

    /// Lowercase name as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Open => "open",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Closed => "closed",
        }
    }
}

/// Persisted representation of a hosted game listing.
///
/// Scheduling inputs stay as loosely typed strings so a single malformed
/// record surfaces as a per-listing integrity error instead of failing a
/// whole query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntity {
    /// Document identifier.
    pub id: ListingId,
    /// Sport being played, as entered by the host.
    pub sport: String,
    /// Where the game takes place.
    pub venue: String,
    /// Calendar day, `dd/mm/yyyy`.
    pub date: Option<String>,
    /// Start of the window, `HH:MM` (24h).
    pub start_time: Option<String>,
    /// End of the window, `HH:MM` (24h).
    pub end_time: Option<String>,
    /// Human formatted window chosen by the host (e.g. `7pm-9pm`).
    #[serde(default)]
    pub time_display: Option<String>,
    /// Expected skill level.
    pub skill: String,
    /// Chat-platform user id of the host.
    pub host_id: i64,
    /// Handle of the host, shown in reminders when known.
    #[serde(default)]
    pub host_username: Option<String>,
    /// Linked chat group in storage form.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Invite link shown as the join affordance.
    #[serde(default)]
    pub group_link: Option<String>,
    /// Message id of the public announcement in the announcement channel.
    #[serde(default)]
    pub announcement_message_id: Option<i64>,
    /// Lifecycle status.
    pub status: ListingStatus,
    /// Players in the linked group, host included. Never below 1.
    #[serde(default = "default_participant_count")]
    pub participant_count: u32,
    /// Set once the day-before reminder went out.
    #[serde(default)]
    pub reminder_24h_sent: bool,
    /// Set once the two-hour reminder went out.
    #[serde(default)]
    pub reminder_2h_sent: bool,
}

fn default_participant_count() -> u32 {
    1
}

/// Field-level reasons a listing cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblems(pub Vec<&'static str>);

impl fmt::Display for FieldProblems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

impl ListingEntity {
    /// Whether the listing still accepts players.
    pub fn is_open(&self) -> bool {
        self.status == ListingStatus::Open
    }

    /// Whether at least one pre-start reminder is still outstanding.
    pub fn needs_reminders(&self) -> bool {
        !self.reminder_24h_sent || !self.reminder_2h_sent
    }

    /// Linked chat group, if the listing has a valid one.
    pub fn group(&self) -> Result<GroupId, FieldProblems> {
        match self.group_id.as_deref() {
            Some(raw) => GroupId::from_storage(raw).map_err(|_| FieldProblems(vec!["group_id"])),
            None => Err(FieldProblems(vec!["group_id"])),
        }
    }

    /// Start instant of the game in the given offset.
    pub fn starts_at(&self, offset: UtcOffset) -> Result<OffsetDateTime, FieldProblems> {
        self.instant(self.start_time.as_deref(), "start_time", offset)
    }

    /// End instant of the game in the given offset.
    pub fn ends_at(&self, offset: UtcOffset) -> Result<OffsetDateTime, FieldProblems> {
        self.instant(self.end_time.as_deref(), "end_time", offset)
    }

    /// Window shown to players, preferring the host's own formatting.
    pub fn time_window(&self) -> String {
        if let Some(display) = self.time_display.as_deref().filter(|d| !d.trim().is_empty()) {
            return display.to_owned();
        }
        match (self.start_time.as_deref(), self.end_time.as_deref()) {
            (Some(start), Some(end)) => format!("{start}-{end}"),
            (Some(start), None) => start.to_owned(),
            _ => "TBC".to_owned(),
        }
    }

    fn instant(
        &self,
        clock_time: Option<&str>,
        field: &'static str,
        offset: UtcOffset,
    ) -> Result<OffsetDateTime, FieldProblems> {
        let date = self.date.as_deref().and_then(parse_date);
        let time = clock_time.and_then(parse_clock_time);

        match (date, time) {
            (Some(date), Some(time)) => {
                Ok(PrimitiveDateTime::new(date, time).assume_offset(offset))
            }
            (None, Some(_)) => Err(FieldProblems(vec!["date"])),
            (Some(_), None) => Err(FieldProblems(vec![field])),
            (None, None) => Err(FieldProblems(vec!["date", field])),
        }
    }
}

/// Parse a `dd/mm/yyyy` calendar date.
pub fn parse_date(value: &str) -> Option<Date> {
    let mut parts = value.trim().split('/');
    let day = parts.next()?.trim().parse::<u8>().ok()?;
    let month = parts.next()?.trim().parse::<u8>().ok()?;
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Parse a 24h `HH:MM` clock time.
pub fn parse_clock_time(value: &str) -> Option<Time> {
    let (hour, minute) = value.trim().split_once(':')?;
    let hour = hour.trim().parse::<u8>().ok()?;
    let minute = minute.trim().parse::<u8>().ok()?;
    Time::from_hms(hour, minute, 0).ok()
}

/// Partial update merged into a stored listing. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPatch {
    /// New lifecycle status.
    pub status: Option<ListingStatus>,
    /// New participant counter, clamped to at least 1.
    pub participant_count: Option<u32>,
    /// Day-before reminder flag. Only `true` is ever written.
    pub reminder_24h_sent: Option<bool>,
    /// Two-hour reminder flag. Only `true` is ever written.
    pub reminder_2h_sent: Option<bool>,
}

impl ListingPatch {
    /// Patch changing only the status.
    pub fn status(status: ListingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch changing only the participant counter.
    pub fn participant_count(count: u32) -> Self {
        Self {
            participant_count: Some(count),
            ..Self::default()
        }
    }

    /// Merge the patch into an entity, keeping monotonic fields monotonic.
    pub fn apply_to(&self, listing: &mut ListingEntity) {
        if let Some(status) = self.status {
            if listing.status.can_transition_to(status) {
                listing.status = status;
            }
        }
        if let Some(count) = self.participant_count {
            listing.participant_count = count.max(1);
        }
        if let Some(sent) = self.reminder_24h_sent {
            listing.reminder_24h_sent |= sent;
        }
        if let Some(sent) = self.reminder_2h_sent {
            listing.reminder_2h_sent |= sent;
        }
    }
}
