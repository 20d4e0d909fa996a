//! `SyncConnectionRepo` (spec §6) against `chat_sync_connections`.

use async_trait::async_trait;
use sqlx::PgPool;

use chatsync_core::repos::SyncConnectionRepo;
use chatsync_types::{Provider, SyncConnection, SyncConnectionId, SyncResult};

use crate::error::DbError;
use crate::models::DbSyncConnection;

pub struct PgSyncConnectionRepo {
    pool: PgPool,
}

impl PgSyncConnectionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncConnectionRepo for PgSyncConnectionRepo {
    async fn find_by_id(&self, id: SyncConnectionId) -> SyncResult<Option<SyncConnection>> {
        let row = sqlx::query_as::<_, DbSyncConnection>(
            r#"
            SELECT id, organization_id, provider, external_workspace_id, status,
                   last_synced_at, created_by, created_at, deleted_at
            FROM chat_sync_connections
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(Into::into))
    }

    async fn find_active_by_provider(&self, provider: Provider) -> SyncResult<Vec<SyncConnection>> {
        let rows = sqlx::query_as::<_, DbSyncConnection>(
            r#"
            SELECT id, organization_id, provider, external_workspace_id, status,
                   last_synced_at, created_by, created_at, deleted_at
            FROM chat_sync_connections
            WHERE provider = $1 AND status = 'active' AND deleted_at IS NULL
            "#,
        )
        .bind(provider.tag())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_last_synced_at(&self, id: SyncConnectionId) -> SyncResult<()> {
        sqlx::query("UPDATE chat_sync_connections SET last_synced_at = now() WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}
