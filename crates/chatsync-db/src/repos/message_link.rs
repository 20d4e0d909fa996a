//! `SyncMessageLinkRepo` (spec §6) against `chat_sync_message_links`.

use async_trait::async_trait;
use sqlx::PgPool;

use chatsync_core::repos::SyncMessageLinkRepo;
use chatsync_types::{
    ExternalMessageId, HazelMessageId, NewSyncMessageLink, SyncChannelLinkId, SyncMessageLink,
    SyncMessageLinkId, SyncResult,
};

use crate::error::DbError;
use crate::models::DbSyncMessageLink;

pub struct PgSyncMessageLinkRepo {
    pool: PgPool,
}

impl PgSyncMessageLinkRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, channel_link_id, hazel_message_id, external_message_id, source,
    hazel_thread_id, external_thread_id, root_hazel_message_id, created_at, deleted_at
"#;

#[async_trait]
impl SyncMessageLinkRepo for PgSyncMessageLinkRepo {
    async fn find_by_hazel_message(
        &self,
        channel_link_id: SyncChannelLinkId,
        hazel_message_id: &HazelMessageId,
    ) -> SyncResult<Option<SyncMessageLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_message_links
             WHERE channel_link_id = $1 AND hazel_message_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, DbSyncMessageLink>(&query)
            .bind(channel_link_id.0)
            .bind(hazel_message_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_external_message(
        &self,
        channel_link_id: SyncChannelLinkId,
        external_message_id: &ExternalMessageId,
    ) -> SyncResult<Option<SyncMessageLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_message_links
             WHERE channel_link_id = $1 AND external_message_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, DbSyncMessageLink>(&query)
            .bind(channel_link_id.0)
            .bind(external_message_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, row: NewSyncMessageLink) -> SyncResult<SyncMessageLink> {
        let query = format!(
            r#"
            INSERT INTO chat_sync_message_links
                (channel_link_id, hazel_message_id, external_message_id, source,
                 hazel_thread_id, external_thread_id, root_hazel_message_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, DbSyncMessageLink>(&query)
            .bind(row.channel_link_id.0)
            .bind(row.hazel_message_id.as_str())
            .bind(row.external_message_id.as_str())
            .bind(row.source.tag())
            .bind(row.hazel_thread_id.as_ref().map(|id| id.as_str()))
            .bind(row.external_thread_id.as_ref().map(|id| id.as_str()))
            .bind(row.root_hazel_message_id.as_ref().map(|id| id.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(inserted.into())
    }

    async fn update_last_synced_at(&self, _id: SyncMessageLinkId) -> SyncResult<()> {
        // `SyncMessageLink` carries no `last_synced_at` column of its own —
        // the heartbeat lands on the connection and channel link rows
        // (spec §4.4.1 step 9). Kept as a no-op to satisfy the trait shape
        // spec §6 names for symmetry with the other repos.
        Ok(())
    }

    async fn soft_delete(&self, id: SyncMessageLinkId) -> SyncResult<()> {
        sqlx::query("UPDATE chat_sync_message_links SET deleted_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}
