//! The provider capability interface (spec §4.1).
//!
//! Every adapter operation fails with exactly one of `ProviderError::Configuration`
//! (missing/invalid secret) or `ProviderError::Api` (transport/HTTP) — never a
//! bare transport error.

use async_trait::async_trait;

use chatsync_types::{ExternalChannelId, ExternalMessageId, ProviderResult};

#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub external_channel_id: ExternalChannelId,
    pub content: String,
    pub reply_to_external_message_id: Option<ExternalMessageId>,
}

#[derive(Debug, Clone)]
pub struct UpdateMessageRequest {
    pub external_channel_id: ExternalChannelId,
    pub external_message_id: ExternalMessageId,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DeleteMessageRequest {
    pub external_channel_id: ExternalChannelId,
    pub external_message_id: ExternalMessageId,
}

#[derive(Debug, Clone)]
pub struct ReactionRequest {
    pub external_channel_id: ExternalChannelId,
    pub external_message_id: ExternalMessageId,
    pub emoji: String,
}

#[derive(Debug, Clone)]
pub struct CreateThreadRequest {
    pub external_channel_id: ExternalChannelId,
    pub external_message_id: ExternalMessageId,
    pub name: String,
}

/// Per-provider network I/O, abstracted behind a small capability interface
/// (spec §2.1, §4.1).
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn create_message(&self, req: CreateMessageRequest) -> ProviderResult<ExternalMessageId>;

    async fn update_message(&self, req: UpdateMessageRequest) -> ProviderResult<()>;

    async fn delete_message(&self, req: DeleteMessageRequest) -> ProviderResult<()>;

    async fn add_reaction(&self, req: ReactionRequest) -> ProviderResult<()>;

    async fn remove_reaction(&self, req: ReactionRequest) -> ProviderResult<()>;

    async fn create_thread(&self, req: CreateThreadRequest) -> ProviderResult<String>;
}
