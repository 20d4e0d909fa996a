//! `EventReceiptRepo` — the at-most-one-effect primitive (spec §4.2),
//! translated into Postgres as `INSERT ... ON CONFLICT DO NOTHING`.

use async_trait::async_trait;
use sqlx::PgPool;

use chatsync_core::repos::{CommitReceipt, EventReceiptRepo};
use chatsync_types::{SyncChannelLinkId, SyncConnectionId, SyncResult, SyncSource};

use crate::error::DbError;
use crate::models::receipt_status_tag;

pub struct PgEventReceiptRepo {
    pool: PgPool,
}

impl PgEventReceiptRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventReceiptRepo for PgEventReceiptRepo {
    /// `INSERT ... ON CONFLICT (sync_connection_id, source, dedupe_key) DO
    /// UPDATE ... WHERE status = 'failed'` — the idiomatic sqlx translation
    /// of "insert, unique violation against anything but a failed row means
    /// duplicate": `rows_affected == 1` is `true` on a fresh insert and on
    /// reclaiming a `failed` row, `false` against `claimed`/`processed`/
    /// `ignored` (spec §4.2, §8 property 1; §9 Open Question 1 — a `failed`
    /// row must be re-claimable or the documented retry never happens).
    async fn claim(
        &self,
        sync_connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        channel_link_id: Option<SyncChannelLinkId>,
    ) -> SyncResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_sync_event_receipts
                (sync_connection_id, source, dedupe_key, channel_link_id, status)
            VALUES ($1, $2, $3, $4, 'claimed')
            ON CONFLICT (sync_connection_id, source, dedupe_key) DO UPDATE
                SET status = 'claimed', error_message = NULL, committed_at = NULL
                WHERE chat_sync_event_receipts.status = 'failed'
            "#,
        )
        .bind(sync_connection_id.0)
        .bind(source.tag())
        .bind(dedupe_key)
        .bind(channel_link_id.map(|id| id.0))
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() == 1)
    }

    /// Idempotent by construction: last write wins, no affected-rows check
    /// required (spec §4.2).
    async fn commit(&self, params: CommitReceipt<'_>) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE chat_sync_event_receipts
            SET status = $4,
                payload_hash = COALESCE($5, payload_hash),
                error_message = $6,
                channel_link_id = COALESCE($7, channel_link_id),
                committed_at = now()
            WHERE sync_connection_id = $1 AND source = $2 AND dedupe_key = $3
            "#,
        )
        .bind(params.sync_connection_id.0)
        .bind(params.source.tag())
        .bind(params.dedupe_key)
        .bind(receipt_status_tag(params.status))
        .bind(params.payload_hash)
        .bind(params.error_message)
        .bind(params.channel_link_id.map(|id| id.0))
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }
}
