//! Wire models of the Bot API subset used here.

use std::time::Duration;

use serde::Deserialize;

use crate::platform::{ChatMember, ChatUser, MemberStatus, PlatformError, PlatformResult};

/// Envelope wrapping every Bot API answer.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self, method: &'static str) -> PlatformResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(PlatformError::Rejected {
                method,
                description: "response carried no result".into(),
            }),
            (false, _) => Err(classify_failure(
                method,
                self.error_code,
                self.description.unwrap_or_default(),
                self.parameters.and_then(|p| p.retry_after),
            )),
        }
    }
}

/// Map a Bot API failure onto the categories callers branch on.
pub fn classify_failure(
    method: &'static str,
    error_code: Option<u16>,
    description: String,
    retry_after: Option<u64>,
) -> PlatformError {
    let lowered = description.to_lowercase();
    if error_code == Some(429) || retry_after.is_some() {
        return PlatformError::RateLimited {
            retry_after: retry_after.map(Duration::from_secs),
        };
    }
    if lowered.contains("message is not modified") {
        return PlatformError::NotModified;
    }
    if lowered.contains("not found") {
        return PlatformError::NotFound(description);
    }
    PlatformError::Rejected {
        method,
        description,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl From<ApiUser> for ChatUser {
    fn from(value: ApiUser) -> Self {
        Self {
            id: value.id,
            is_bot: value.is_bot,
            display_name: value.username.unwrap_or(value.first_name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChatMember {
    pub status: String,
    pub user: ApiUser,
    #[serde(default)]
    pub is_member: Option<bool>,
}

impl ApiChatMember {
    pub fn member_status(&self) -> MemberStatus {
        match self.status.as_str() {
            "creator" => MemberStatus::Creator,
            "administrator" => MemberStatus::Administrator,
            "member" => MemberStatus::Member,
            "restricted" => MemberStatus::Restricted {
                is_member: self.is_member.unwrap_or(false),
            },
            "kicked" => MemberStatus::Kicked,
            _ => MemberStatus::Left,
        }
    }
}

impl From<ApiChatMember> for ChatMember {
    fn from(value: ApiChatMember) -> Self {
        let status = value.member_status();
        Self {
            user: value.user.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub message_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChatMemberUpdated {
    pub chat: ApiChat,
    pub old_chat_member: ApiChatMember,
    pub new_chat_member: ApiChatMember,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub chat_member: Option<ApiChatMemberUpdated>,
}
