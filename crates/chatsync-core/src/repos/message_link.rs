//! `ChatSyncMessageLinkRepo` (spec §6).

use async_trait::async_trait;

use chatsync_types::{
    ExternalMessageId, HazelMessageId, NewSyncMessageLink, SyncChannelLinkId, SyncMessageLink,
    SyncMessageLinkId, SyncResult,
};

#[async_trait]
pub trait SyncMessageLinkRepo: Send + Sync {
    async fn find_by_hazel_message(
        &self,
        channel_link_id: SyncChannelLinkId,
        hazel_message_id: &HazelMessageId,
    ) -> SyncResult<Option<SyncMessageLink>>;

    async fn find_by_external_message(
        &self,
        channel_link_id: SyncChannelLinkId,
        external_message_id: &ExternalMessageId,
    ) -> SyncResult<Option<SyncMessageLink>>;

    async fn insert(&self, row: NewSyncMessageLink) -> SyncResult<SyncMessageLink>;

    async fn update_last_synced_at(&self, id: SyncMessageLinkId) -> SyncResult<()>;

    async fn soft_delete(&self, id: SyncMessageLinkId) -> SyncResult<()>;
}
