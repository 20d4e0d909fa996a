//! `ChatSyncConnectionRepo` (spec §6).

use async_trait::async_trait;

use chatsync_types::{Provider, SyncConnection, SyncConnectionId, SyncResult};

#[async_trait]
pub trait SyncConnectionRepo: Send + Sync {
    async fn find_by_id(&self, id: SyncConnectionId) -> SyncResult<Option<SyncConnection>>;

    async fn find_active_by_provider(&self, provider: Provider) -> SyncResult<Vec<SyncConnection>>;

    async fn update_last_synced_at(&self, id: SyncConnectionId) -> SyncResult<()>;
}
