//! The Discord REST `Adapter` (spec §4.1, §6), grounded on
//! `openibank_llm::providers::OllamaProvider`'s reqwest-client-plus-config
//! shape: a plain struct holding a `reqwest::Client` and typed request/
//! response structs per endpoint, no retry/backoff logic of its own.

use async_trait::async_trait;
use serde::Serialize;

use chatsync_provider::adapter::{
    Adapter, CreateMessageRequest, CreateThreadRequest, DeleteMessageRequest, ReactionRequest,
    UpdateMessageRequest,
};
use chatsync_types::{ExternalMessageId, ProviderError, ProviderResult};

use crate::config::DiscordConfig;

pub struct DiscordAdapter {
    config: DiscordConfig,
    client: reqwest::Client,
}

impl DiscordAdapter {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn bot_token(&self) -> ProviderResult<&str> {
        self.config
            .bot_token
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration("DISCORD_BOT_TOKEN is not set".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    fn api_error(message: impl Into<String>, status: Option<u16>) -> ProviderError {
        ProviderError::Api {
            provider: "discord".to_string(),
            message: message.into(),
            status,
            detail: None,
        }
    }

    /// Sends a request, translating transport failures, non-2xx responses,
    /// and malformed JSON bodies into `ProviderError::Api` per spec §4.1's
    /// exact translation rules. `allow_404` lets `delete_message` treat a
    /// 404 as success (SPEC_FULL §9's resolution of the delete asymmetry).
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        allow_404: bool,
    ) -> ProviderResult<Option<serde_json::Value>> {
        let token = self.bot_token()?;

        let response = builder
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await
            .map_err(|e| Self::api_error(e.to_string(), None))?;

        let status = response.status();

        if allow_404 && status.as_u16() == 404 {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(Self::api_error(
                format!("discord returned HTTP {status}"),
                Some(status.as_u16()),
            ));
        }

        if status.as_u16() == 204 {
            return Ok(None);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::api_error(e.to_string(), None))?;

        Ok(Some(body))
    }

    fn extract_id(body: Option<serde_json::Value>) -> ProviderResult<String> {
        body.as_ref()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Self::api_error("response missing id", None))
    }
}

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference<'a>>,
}

#[derive(Serialize)]
struct MessageReference<'a> {
    message_id: &'a str,
}

#[derive(Serialize)]
struct UpdateMessageBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct CreateThreadBody<'a> {
    name: &'a str,
}

#[async_trait]
impl Adapter for DiscordAdapter {
    async fn create_message(&self, req: CreateMessageRequest) -> ProviderResult<ExternalMessageId> {
        let url = self.url(&format!("/channels/{}/messages", req.external_channel_id));
        let body = CreateMessageBody {
            content: &req.content,
            message_reference: req
                .reply_to_external_message_id
                .as_ref()
                .map(|id| MessageReference { message_id: id.as_str() }),
        };
        let response = self.send(self.client.post(url).json(&body), false).await?;
        let id = Self::extract_id(response)?;
        Ok(ExternalMessageId::new(id))
    }

    async fn update_message(&self, req: UpdateMessageRequest) -> ProviderResult<()> {
        let url = self.url(&format!(
            "/channels/{}/messages/{}",
            req.external_channel_id, req.external_message_id
        ));
        let body = UpdateMessageBody { content: &req.content };
        self.send(self.client.patch(url).json(&body), false).await?;
        Ok(())
    }

    /// A `404` here is treated as success, not `ProviderApiError` — the
    /// message is already gone, which is the caller's desired end state
    /// (SPEC_FULL §9, resolving spec.md §9.2's delete asymmetry).
    async fn delete_message(&self, req: DeleteMessageRequest) -> ProviderResult<()> {
        let url = self.url(&format!(
            "/channels/{}/messages/{}",
            req.external_channel_id, req.external_message_id
        ));
        self.send(self.client.delete(url), true).await?;
        Ok(())
    }

    async fn add_reaction(&self, req: ReactionRequest) -> ProviderResult<()> {
        let url = self.url(&format!(
            "/channels/{}/messages/{}/reactions/{}/@me",
            req.external_channel_id,
            req.external_message_id,
            urlencode_emoji(&req.emoji)
        ));
        self.send(self.client.put(url), false).await?;
        Ok(())
    }

    async fn remove_reaction(&self, req: ReactionRequest) -> ProviderResult<()> {
        let url = self.url(&format!(
            "/channels/{}/messages/{}/reactions/{}/@me",
            req.external_channel_id,
            req.external_message_id,
            urlencode_emoji(&req.emoji)
        ));
        self.send(self.client.delete(url), false).await?;
        Ok(())
    }

    async fn create_thread(&self, req: CreateThreadRequest) -> ProviderResult<String> {
        let url = self.url(&format!(
            "/channels/{}/messages/{}/threads",
            req.external_channel_id, req.external_message_id
        ));
        let body = CreateThreadBody { name: &req.name };
        let response = self.send(self.client.post(url).json(&body), false).await?;
        Self::extract_id(response)
    }
}

fn urlencode_emoji(emoji: &str) -> String {
    // Discord reaction emoji are either a unicode codepoint or
    // `name:id`; the colon and unicode bytes both need percent-encoding
    // in the path segment.
    let mut out = String::with_capacity(emoji.len());
    for byte in emoji.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
