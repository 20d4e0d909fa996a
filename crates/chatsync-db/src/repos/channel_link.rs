//! `SyncChannelLinkRepo` (spec §6) against `chat_sync_channel_links`.

use async_trait::async_trait;
use sqlx::PgPool;

use chatsync_core::repos::SyncChannelLinkRepo;
use chatsync_types::{
    ExternalChannelId, HazelChannelId, SyncChannelLink, SyncChannelLinkId, SyncConnectionId,
    SyncResult,
};

use crate::error::DbError;
use crate::models::DbSyncChannelLink;

pub struct PgSyncChannelLinkRepo {
    pool: PgPool,
}

impl PgSyncChannelLinkRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, sync_connection_id, hazel_channel_id, external_channel_id, direction,
    is_active, last_synced_at, created_at, deleted_at
"#;

#[async_trait]
impl SyncChannelLinkRepo for PgSyncChannelLinkRepo {
    async fn find_by_hazel_channel(
        &self,
        connection: SyncConnectionId,
        hazel_channel_id: &HazelChannelId,
    ) -> SyncResult<Option<SyncChannelLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_channel_links
             WHERE sync_connection_id = $1 AND hazel_channel_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, DbSyncChannelLink>(&query)
            .bind(connection.0)
            .bind(hazel_channel_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_external_channel(
        &self,
        connection: SyncConnectionId,
        external_channel_id: &ExternalChannelId,
    ) -> SyncResult<Option<SyncChannelLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_channel_links
             WHERE sync_connection_id = $1 AND external_channel_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, DbSyncChannelLink>(&query)
            .bind(connection.0)
            .bind(external_channel_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn find_active_by_sync_connection(
        &self,
        connection: SyncConnectionId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_channel_links
             WHERE sync_connection_id = $1 AND is_active AND deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, DbSyncChannelLink>(&query)
            .bind(connection.0)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cross-tenant lookup used by the gateway consumer (spec §4.7 step 3).
    async fn find_active_by_external_channel(
        &self,
        external_channel_id: &ExternalChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_channel_links
             WHERE external_channel_id = $1 AND is_active AND deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, DbSyncChannelLink>(&query)
            .bind(external_channel_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cross-connection lookup used by the fan-out dispatcher (spec §4.5
    /// step 2).
    async fn find_active_by_hazel_channel(
        &self,
        hazel_channel_id: &HazelChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chat_sync_channel_links
             WHERE hazel_channel_id = $1 AND is_active AND deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, DbSyncChannelLink>(&query)
            .bind(hazel_channel_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_last_synced_at(&self, id: SyncChannelLinkId) -> SyncResult<()> {
        sqlx::query("UPDATE chat_sync_channel_links SET last_synced_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}
