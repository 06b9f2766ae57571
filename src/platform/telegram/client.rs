use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{
    api::{ApiChatMember, ApiEnvelope, ApiMessage, ApiUpdate},
    config::TelegramConfig,
};
use crate::{
    platform::{
        ChatMember, ChatPlatform, ChatTarget, MessageId, OutgoingMessage, PlatformError,
        PlatformResult, PollRequest,
    },
    state::group_id::GroupId,
};

/// Bot API client speaking JSON over HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: Arc<str>,
    long_poll_secs: u64,
}

impl TelegramClient {
    /// Build the HTTP client for `config`.
    pub fn new(config: TelegramConfig) -> PlatformResult<Self> {
        // Long polls must outlive the server-side wait.
        let timeout = config
            .request_timeout
            .max(std::time::Duration::from_secs(config.long_poll_secs + 5));
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| PlatformError::Transport {
                method: "client",
                source: Box::new(source),
            })?;

        Ok(Self {
            http,
            base_url: Arc::from(config.method_base()),
            long_poll_secs: config.long_poll_secs,
        })
    }

    async fn call<T>(&self, method: &'static str, payload: Value) -> PlatformResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| PlatformError::Transport {
                method,
                source: Box::new(source),
            })?;

        let status = response.status();
        let envelope = response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(|source| match status {
                StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimited { retry_after: None },
                _ => PlatformError::Transport {
                    method,
                    source: Box::new(source),
                },
            })?;

        envelope.into_result(method)
    }

    /// Fetch pending updates after `offset`, waiting server-side up to the long-poll window.
    pub(super) async fn get_updates(&self, offset: i64) -> PlatformResult<Vec<ApiUpdate>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.long_poll_secs,
                "allowed_updates": ["chat_member"],
            }),
        )
        .await
    }
}

fn message_payload(chat: &ChatTarget, message: &OutgoingMessage) -> Value {
    let mut payload = json!({
        "chat_id": chat.to_string(),
        "text": message.text,
        "disable_web_page_preview": true,
    });
    if message.markdown {
        payload["parse_mode"] = json!("Markdown");
    }
    payload["reply_markup"] = match &message.join_button {
        Some(button) => json!({
            "inline_keyboard": [[{"text": button.label, "url": button.url}]]
        }),
        None => json!({"inline_keyboard": []}),
    };
    payload
}

impl ChatPlatform for TelegramClient {
    fn member_count(&self, group: GroupId) -> BoxFuture<'static, PlatformResult<u32>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .call(
                    "getChatMemberCount",
                    json!({"chat_id": group.to_platform()}),
                )
                .await
        })
    }

    fn administrators(&self, group: GroupId) -> BoxFuture<'static, PlatformResult<Vec<ChatMember>>> {
        let client = self.clone();
        Box::pin(async move {
            let admins: Vec<ApiChatMember> = client
                .call(
                    "getChatAdministrators",
                    json!({"chat_id": group.to_platform()}),
                )
                .await?;
            Ok(admins.into_iter().map(Into::into).collect())
        })
    }

    fn send_message(
        &self,
        chat: ChatTarget,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<MessageId>> {
        let client = self.clone();
        Box::pin(async move {
            let mut payload = message_payload(&chat, &message);
            if message.join_button.is_none() {
                if let Some(fields) = payload.as_object_mut() {
                    fields.remove("reply_markup");
                }
            }
            let sent: ApiMessage = client.call("sendMessage", payload).await?;
            Ok(sent.message_id)
        })
    }

    fn send_poll(
        &self,
        chat: ChatTarget,
        poll: PollRequest,
    ) -> BoxFuture<'static, PlatformResult<MessageId>> {
        let client = self.clone();
        Box::pin(async move {
            let sent: ApiMessage = client
                .call(
                    "sendPoll",
                    json!({
                        "chat_id": chat.to_string(),
                        "question": poll.question,
                        "options": poll.options,
                        "is_anonymous": poll.anonymous,
                        "allows_multiple_answers": poll.multiple_answers,
                    }),
                )
                .await?;
            Ok(sent.message_id)
        })
    }

    fn edit_message(
        &self,
        chat: ChatTarget,
        message_id: MessageId,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let client = self.clone();
        Box::pin(async move {
            let mut payload = message_payload(&chat, &message);
            payload["message_id"] = json!(message_id);
            // Channel edits answer with the message, inline edits with `true`.
            let _: Value = client.call("editMessageText", payload).await?;
            Ok(())
        })
    }

    fn pin_message(
        &self,
        chat: ChatTarget,
        message_id: MessageId,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let client = self.clone();
        Box::pin(async move {
            let _: bool = client
                .call(
                    "pinChatMessage",
                    json!({
                        "chat_id": chat.to_string(),
                        "message_id": message_id,
                        "disable_notification": true,
                    }),
                )
                .await?;
            Ok(())
        })
    }
}
