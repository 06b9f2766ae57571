use std::time::Duration;

use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info, warn};

use super::{api::ApiUpdate, client::TelegramClient};
use crate::{
    platform::{ChatUser, MembershipEvent, PlatformError},
    state::group_id::GroupId,
};

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Long-polls the Bot API and forwards membership changes of game groups.
pub struct UpdatePoller {
    client: TelegramClient,
}

impl UpdatePoller {
    /// Poller reading updates through `client`.
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }

    /// Poll until the receiving side of `events` is dropped.
    pub async fn run(self, events: mpsc::Sender<MembershipEvent>) {
        let mut offset = 0;
        let mut delay = INITIAL_DELAY;

        loop {
            let updates = match self.client.get_updates(offset).await {
                Ok(updates) => {
                    delay = INITIAL_DELAY;
                    updates
                }
                Err(PlatformError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(delay);
                    warn!(?wait, "update polling rate limited");
                    sleep(wait).await;
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "update polling failed; backing off");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(event) = membership_event(update) {
                    if events.send(event).await.is_err() {
                        info!("membership event receiver closed; stopping update poller");
                        return;
                    }
                }
            }
        }
    }
}

/// Translate one update into a membership event.
///
/// Only `chat_member` updates count. The `new_chat_members` and
/// `left_chat_member` service messages describe the same change and are not
/// requested, so each join or leave is seen once.
fn membership_event(update: ApiUpdate) -> Option<MembershipEvent> {
    let change = update.chat_member?;
    let Ok(group) = GroupId::from_platform(change.chat.id) else {
        debug!(chat_id = change.chat.id, "ignoring member update outside a super-group");
        return None;
    };
    let old = change.old_chat_member.member_status();
    let new = change.new_chat_member.member_status();
    let user: ChatUser = change.new_chat_member.user.into();
    MembershipEvent::from_status_change(group, user, old, new)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{
        platform::MembershipChange,
        services::membership::apply_event,
        testing::{Harness, listing},
    };

    fn update(json: &str) -> ApiUpdate {
        serde_json::from_str(json).unwrap()
    }

    fn member_update(update_id: i64, chat_id: i64, old: &str, new: &str) -> ApiUpdate {
        update(&format!(
            r#"{{"update_id": {update_id}, "chat_member": {{
                "chat": {{"id": {chat_id}}},
                "old_chat_member": {{"status": "{old}", "user": {{"id": 7, "is_bot": false, "first_name": "Kai"}}}},
                "new_chat_member": {{"status": "{new}", "user": {{"id": 7, "is_bot": false, "first_name": "Kai"}}}}
            }}}}"#
        ))
    }

    fn join_service_message(update_id: i64) -> ApiUpdate {
        update(&format!(
            r#"{{"update_id": {update_id}, "message": {{
                "message_id": 3,
                "chat": {{"id": -1001234567890}},
                "new_chat_members": [{{"id": 7, "is_bot": false, "first_name": "Kai"}}]
            }}}}"#
        ))
    }

    #[test]
    fn member_status_changes_become_events() {
        let joined = membership_event(member_update(1, -1001234567890, "left", "member")).unwrap();
        assert_eq!(joined.change, MembershipChange::Joined);
        assert_eq!(joined.users.len(), 1);
        assert_eq!(joined.group.to_storage(), "1234567890");

        let kicked = membership_event(member_update(2, -1001234567890, "member", "kicked")).unwrap();
        assert_eq!(kicked.change, MembershipChange::Left);
    }

    #[test]
    fn service_messages_basic_groups_and_promotions_are_ignored() {
        assert!(membership_event(join_service_message(1)).is_none());
        assert!(membership_event(member_update(2, -4242, "left", "member")).is_none());
        assert!(
            membership_event(member_update(3, -1001234567890, "member", "administrator")).is_none()
        );
    }

    #[tokio::test]
    async fn invite_link_join_is_counted_once() {
        let harness = Harness::new(datetime!(2026-03-03 12:00 +8));
        harness.store.insert(listing("g1"));

        for update in [
            join_service_message(10),
            member_update(11, -1001234567890, "left", "member"),
        ] {
            if let Some(event) = membership_event(update) {
                apply_event(&harness.state, event).await.unwrap();
            }
        }

        assert_eq!(harness.stored("g1").participant_count, 2);
    }
}
