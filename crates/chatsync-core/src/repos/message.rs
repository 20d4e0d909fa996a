//! `MessageRepo` (spec §6) plus the backfill-scoped query from §4.4.6.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chatsync_types::{
    HazelChannelId, HazelMessage, HazelMessageId, NewHazelMessage, SyncChannelLinkId, SyncResult,
};

#[async_trait]
pub trait MessageRepo: Send + Sync {
    async fn find_by_id(&self, id: &HazelMessageId) -> SyncResult<Option<HazelMessage>>;

    async fn insert(&self, row: NewHazelMessage) -> SyncResult<HazelMessage>;

    async fn update_content(&self, id: &HazelMessageId, content: &str) -> SyncResult<()>;

    async fn soft_delete(&self, id: &HazelMessageId, deleted_at: DateTime<Utc>) -> SyncResult<()>;

    /// Rows in `hazel_channel_id` with no live `SyncMessageLink` for
    /// `channel_link_id`, ordered `(createdAt ASC, id ASC)`, bounded by
    /// `limit` (spec §4.4.6, §8 property 5).
    async fn find_unmirrored_for_channel_link(
        &self,
        hazel_channel_id: &HazelChannelId,
        channel_link_id: SyncChannelLinkId,
        limit: i64,
    ) -> SyncResult<Vec<HazelMessage>>;
}
