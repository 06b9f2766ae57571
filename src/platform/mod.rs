//! Contract for the chat platform hosting game groups and the announcement channel.

#[cfg(feature = "telegram-client")]
pub mod telegram;

use std::{fmt, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::state::group_id::GroupId;

/// Identifier of a message inside a chat.
pub type MessageId = i64;

/// Result alias for chat platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Failures reported by the chat platform, split along the lines callers branch on.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The chat or message no longer exists (or the bot lost access to it).
    #[error("not found: {0}")]
    NotFound(String),
    /// An edit carried content identical to the current message.
    #[error("message is not modified")]
    NotModified,
    /// The platform throttled the bot.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    /// The request never produced a platform answer.
    #[error("platform request `{method}` failed")]
    Transport {
        method: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The platform answered with an error we do not classify further.
    #[error("platform rejected `{method}`: {description}")]
    Rejected {
        method: &'static str,
        description: String,
    },
}

/// Destination of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// A game's chat group.
    Group(GroupId),
    /// A public channel, either `@handle` or a numeric id.
    Channel(String),
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Group(group) => write!(f, "{}", group.to_platform()),
            ChatTarget::Channel(channel) => f.write_str(channel),
        }
    }
}

/// Account as seen in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    /// Platform user id.
    pub id: i64,
    /// Bots never count as players.
    pub is_bot: bool,
    /// Name for log lines.
    pub display_name: String,
}

/// Membership state of an account inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Owner of the chat.
    Creator,
    /// Promoted member.
    Administrator,
    /// Regular member.
    Member,
    /// Restricted accounts may still be present in the chat.
    Restricted { is_member: bool },
    /// No longer in the chat.
    Left,
    /// Banned from the chat.
    Kicked,
}

impl MemberStatus {
    /// Whether the account currently counts as being in the chat.
    pub fn is_present(self) -> bool {
        match self {
            MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member => true,
            MemberStatus::Restricted { is_member } => is_member,
            MemberStatus::Left | MemberStatus::Kicked => false,
        }
    }
}

/// An account together with its status in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMember {
    /// The account.
    pub user: ChatUser,
    /// Its current status.
    pub status: MemberStatus,
}

/// Inline button linking to the game's chat group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinButton {
    /// Button caption.
    pub label: String,
    /// Invite link of the group.
    pub url: String,
}

/// Message content sent or edited through the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Message body.
    pub text: String,
    /// Render `text` as Markdown.
    pub markdown: bool,
    /// Inline join button, if any.
    pub join_button: Option<JoinButton>,
}

impl OutgoingMessage {
    /// Plain-text message without buttons.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
            join_button: None,
        }
    }

    /// Markdown message without buttons.
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
            join_button: None,
        }
    }

    /// Attach (or clear) the join button.
    pub fn with_join_button(mut self, button: Option<JoinButton>) -> Self {
        self.join_button = button;
        self
    }
}

/// Poll posted into a game group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    /// Question shown above the options.
    pub question: String,
    /// Answer options, in order.
    pub options: Vec<String>,
    /// Whether voters are hidden.
    pub anonymous: bool,
    /// Whether a voter may pick several options.
    pub multiple_answers: bool,
}

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// Accounts entered the group.
    Joined,
    /// Accounts left or were removed.
    Left,
}

/// Notification that accounts joined or left a game group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    /// Group the change happened in.
    pub group: GroupId,
    /// Join or leave.
    pub change: MembershipChange,
    /// Accounts affected by the change.
    pub users: Vec<ChatUser>,
}

impl MembershipEvent {
    /// Interpret a single account's status transition.
    ///
    /// Only transitions that cross the "present in chat" boundary count;
    /// promotions, demotions and restrictions of present members are ignored.
    pub fn from_status_change(
        group: GroupId,
        user: ChatUser,
        old: MemberStatus,
        new: MemberStatus,
    ) -> Option<Self> {
        let change = match (old.is_present(), new.is_present()) {
            (false, true) => MembershipChange::Joined,
            (true, false) => MembershipChange::Left,
            _ => return None,
        };
        Some(Self {
            group,
            change,
            users: vec![user],
        })
    }
}

/// Operations the lifecycle core needs from the chat platform.
pub trait ChatPlatform: Send + Sync {
    /// Total number of accounts in the group, bots included.
    fn member_count(&self, group: GroupId) -> BoxFuture<'static, PlatformResult<u32>>;
    fn administrators(&self, group: GroupId) -> BoxFuture<'static, PlatformResult<Vec<ChatMember>>>;
    fn send_message(
        &self,
        chat: ChatTarget,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<MessageId>>;
    fn send_poll(
        &self,
        chat: ChatTarget,
        poll: PollRequest,
    ) -> BoxFuture<'static, PlatformResult<MessageId>>;
    /// Replace the content of an existing message. Never creates a new one.
    fn edit_message(
        &self,
        chat: ChatTarget,
        message_id: MessageId,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Pin a message silently.
    fn pin_message(
        &self,
        chat: ChatTarget,
        message_id: MessageId,
    ) -> BoxFuture<'static, PlatformResult<()>>;
}
