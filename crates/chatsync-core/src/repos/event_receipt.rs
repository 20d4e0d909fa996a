//! `ChatSyncEventReceiptRepo` — the at-most-one-effect primitive (spec §4.2).

use async_trait::async_trait;

use chatsync_types::{ReceiptStatus, SyncChannelLinkId, SyncConnectionId, SyncResult, SyncSource};

/// Fields to persist when committing a previously claimed receipt.
#[derive(Debug, Clone)]
pub struct CommitReceipt<'a> {
    pub sync_connection_id: SyncConnectionId,
    pub source: SyncSource,
    pub dedupe_key: &'a str,
    pub status: ReceiptStatus,
    pub payload_hash: Option<String>,
    pub error_message: Option<String>,
    pub channel_link_id: Option<SyncChannelLinkId>,
}

#[async_trait]
pub trait EventReceiptRepo: Send + Sync {
    /// Inserts a `claimed` row. Returns `false` on a unique-violation of
    /// `(syncConnectionId, source, dedupeKey)` against a `processed`,
    /// `ignored`, or still-`claimed` row — the caller must short-circuit
    /// rather than perform its side effect. A row previously committed
    /// `failed` is re-claimable: this is what makes the `ChannelLinkNotFound`
    /// resolution in spec §9 Open Question 1 actually retryable once the
    /// link reappears, rather than the retry being silently deduped forever.
    /// Any other database error is fatal and propagates (spec §4.2).
    async fn claim(
        &self,
        sync_connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        channel_link_id: Option<SyncChannelLinkId>,
    ) -> SyncResult<bool>;

    /// Updates the previously claimed row with a terminal status. Idempotent
    /// with respect to re-application (last writer wins).
    async fn commit(&self, params: CommitReceipt<'_>) -> SyncResult<()>;
}
