//! `ChatSyncChannelLinkRepo` (spec §6).

use async_trait::async_trait;

use chatsync_types::{
    ExternalChannelId, HazelChannelId, SyncChannelLink, SyncChannelLinkId, SyncConnectionId,
    SyncResult,
};

#[async_trait]
pub trait SyncChannelLinkRepo: Send + Sync {
    async fn find_by_hazel_channel(
        &self,
        connection: SyncConnectionId,
        hazel_channel_id: &HazelChannelId,
    ) -> SyncResult<Option<SyncChannelLink>>;

    async fn find_by_external_channel(
        &self,
        connection: SyncConnectionId,
        external_channel_id: &ExternalChannelId,
    ) -> SyncResult<Option<SyncChannelLink>>;

    async fn find_active_by_sync_connection(
        &self,
        connection: SyncConnectionId,
    ) -> SyncResult<Vec<SyncChannelLink>>;

    /// Cross-tenant lookup used by the gateway consumer: all active links
    /// across every connection and org whose external channel matches
    /// (spec §4.7 step 3).
    async fn find_active_by_external_channel(
        &self,
        external_channel_id: &ExternalChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>>;

    /// Cross-connection lookup used by the fan-out dispatcher: all active
    /// links across every sync connection whose Hazel channel matches
    /// (spec §4.5 step 2 — narrowed to the connection's provider and
    /// active status by the caller, since that requires joining against
    /// `SyncConnectionRepo`).
    async fn find_active_by_hazel_channel(
        &self,
        hazel_channel_id: &HazelChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>>;

    async fn update_last_synced_at(&self, id: SyncChannelLinkId) -> SyncResult<()>;
}
