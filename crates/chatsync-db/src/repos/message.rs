//! `MessageRepo` (spec §6) against a `hazel_messages` table that stands in
//! for Hazel's own message store, plus the backfill-scoped unmirrored-rows
//! query (spec §4.4.6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use chatsync_core::repos::MessageRepo;
use chatsync_types::{
    HazelChannelId, HazelMessage, HazelMessageId, NewHazelMessage, SyncChannelLinkId, SyncResult,
};

use crate::error::DbError;
use crate::models::DbHazelMessage;

pub struct PgMessageRepo {
    pool: PgPool,
}

impl PgMessageRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, channel_id, author_id, content, created_at, updated_at, deleted_at";

#[async_trait]
impl MessageRepo for PgMessageRepo {
    async fn find_by_id(&self, id: &HazelMessageId) -> SyncResult<Option<HazelMessage>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM hazel_messages WHERE id = $1");
        let row = sqlx::query_as::<_, DbHazelMessage>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, row: NewHazelMessage) -> SyncResult<HazelMessage> {
        let query = format!(
            r#"
            INSERT INTO hazel_messages (id, channel_id, author_id, content)
            VALUES (gen_random_uuid()::text, $1, $2, $3)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, DbHazelMessage>(&query)
            .bind(row.channel_id.as_str())
            .bind(row.author_id.as_str())
            .bind(&row.content)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(inserted.into())
    }

    async fn update_content(&self, id: &HazelMessageId, content: &str) -> SyncResult<()> {
        sqlx::query(
            "UPDATE hazel_messages SET content = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn soft_delete(&self, id: &HazelMessageId, deleted_at: DateTime<Utc>) -> SyncResult<()> {
        sqlx::query("UPDATE hazel_messages SET deleted_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(deleted_at)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    /// Rows in `hazel_channel_id` with no live `chat_sync_message_links` row
    /// for `channel_link_id`, ordered oldest-first and capped at `limit`
    /// (spec §4.4.6, §8 property 5). `NOT EXISTS` rather than `LEFT JOIN
    /// ... IS NULL` keeps the plan index-friendly on
    /// `uq_chat_sync_message_links_hazel`.
    async fn find_unmirrored_for_channel_link(
        &self,
        hazel_channel_id: &HazelChannelId,
        channel_link_id: SyncChannelLinkId,
        limit: i64,
    ) -> SyncResult<Vec<HazelMessage>> {
        let query = format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM hazel_messages m
            WHERE m.channel_id = $1
              AND m.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM chat_sync_message_links l
                  WHERE l.channel_link_id = $2
                    AND l.hazel_message_id = m.id
                    AND l.deleted_at IS NULL
              )
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, DbHazelMessage>(&query)
            .bind(hazel_channel_id.as_str())
            .bind(channel_link_id.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
