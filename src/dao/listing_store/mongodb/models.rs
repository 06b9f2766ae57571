use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::{
    dao::models::{ListingEntity, ListingId, ListingPatch, ListingStatus},
    state::group_id::GroupId,
};

/// Listing as laid out in the `listings` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoListingDocument {
    #[serde(rename = "_id")]
    id: ListingId,
    sport: String,
    venue: String,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    time_display: Option<String>,
    skill: String,
    host_id: i64,
    #[serde(default)]
    host_username: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    group_link: Option<String>,
    #[serde(default)]
    announcement_message_id: Option<i64>,
    status: ListingStatus,
    #[serde(default = "default_participant_count")]
    participant_count: i64,
    #[serde(default)]
    reminder_24h_sent: bool,
    #[serde(default)]
    reminder_2h_sent: bool,
}

fn default_participant_count() -> i64 {
    1
}

impl From<MongoListingDocument> for ListingEntity {
    fn from(value: MongoListingDocument) -> Self {
        Self {
            id: value.id,
            sport: value.sport,
            venue: value.venue,
            date: value.date,
            start_time: value.start_time,
            end_time: value.end_time,
            time_display: value.time_display,
            skill: value.skill,
            host_id: value.host_id,
            host_username: value.host_username,
            group_id: value.group_id,
            group_link: value.group_link,
            announcement_message_id: value.announcement_message_id,
            status: value.status,
            participant_count: u32::try_from(value.participant_count.max(1)).unwrap_or(u32::MAX),
            reminder_24h_sent: value.reminder_24h_sent,
            reminder_2h_sent: value.reminder_2h_sent,
        }
    }
}

pub fn doc_id(id: &ListingId) -> Document {
    doc! {"_id": id.as_str()}
}

/// Filter for a listing update. Status changes only match listings that may
/// still move to the requested status.
pub fn update_filter(id: &ListingId, patch: &ListingPatch) -> Document {
    let mut filter = doc_id(id);
    if patch.status.is_some_and(ListingStatus::is_terminal) {
        filter.insert("status", ListingStatus::Open.as_str());
    }
    filter
}

/// Filter for the listings linked to a group, in canonical or legacy signed form.
pub fn group_filter(group: GroupId, open_only: bool) -> Document {
    let mut filter = doc! {
        "group_id": {"$in": [group.to_storage(), group.to_platform().to_string()]}
    };
    if open_only {
        filter.insert("status", ListingStatus::Open.as_str());
    }
    filter
}

/// `$set` document holding only the fields present in the patch, or `None`
/// when nothing would be written.
///
/// Reminder flags are only ever set, never cleared.
pub fn set_document(patch: &ListingPatch) -> Option<Document> {
    let mut set = Document::new();
    if let Some(status) = patch.status {
        set.insert("status", status.as_str());
    }
    if let Some(count) = patch.participant_count {
        set.insert("participant_count", i64::from(count.max(1)));
    }
    if patch.reminder_24h_sent == Some(true) {
        set.insert("reminder_24h_sent", true);
    }
    if patch.reminder_2h_sent == Some(true) {
        set.insert("reminder_2h_sent", true);
    }
    if set.is_empty() {
        return None;
    }
    Some(doc! {"$set": set})
}
