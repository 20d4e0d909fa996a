//! The Discord provider: a REST [`Adapter`](chatsync_provider::Adapter)
//! implementation plus a gateway consumer, wired onto the provider-agnostic
//! [`ChatSyncCoreWorker`].

pub mod adapter;
pub mod config;
pub mod error;
pub mod gateway;

pub use adapter::DiscordAdapter;
pub use config::DiscordConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::GatewayConsumer;

use std::sync::Arc;

use chatsync_core::{ChatSyncCoreWorker, FanoutDispatcher, FanoutSummary};
use chatsync_types::{HazelMessageId, Provider, SyncConnectionId, SyncOutcome, SyncResult};

/// Thin per-provider ergonomic wrapper over [`ChatSyncCoreWorker`], pre-bound
/// to [`Provider::Discord`]. Holds no state of its own — callers who need
/// cross-provider behavior should depend on `ChatSyncCoreWorker` directly
/// (spec §9: per-provider wrappers are optional and don't participate in
/// correctness).
pub struct DiscordSyncWorker {
    worker: Arc<ChatSyncCoreWorker>,
    fanout: FanoutDispatcher,
}

impl DiscordSyncWorker {
    pub fn new(worker: Arc<ChatSyncCoreWorker>) -> Self {
        let fanout = FanoutDispatcher::new(worker.clone());
        Self { worker, fanout }
    }

    pub async fn ingest_message_create(
        &self,
        params: chatsync_core::IngestMessageCreate,
    ) -> SyncResult<SyncOutcome> {
        self.worker.ingest_message_create(params).await
    }

    pub async fn ingest_message_update(
        &self,
        params: chatsync_core::IngestMessageMutation,
    ) -> SyncResult<SyncOutcome> {
        self.worker.ingest_message_update(params).await
    }

    pub async fn ingest_message_delete(
        &self,
        params: chatsync_core::IngestMessageMutation,
    ) -> SyncResult<SyncOutcome> {
        self.worker.ingest_message_delete(params).await
    }

    pub async fn send_message_create(
        &self,
        sync_connection_id: SyncConnectionId,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<SyncOutcome> {
        self.worker
            .send_message_create(sync_connection_id, Provider::Discord, hazel_message_id, dedupe_key)
            .await
    }

    pub async fn send_message_update(
        &self,
        sync_connection_id: SyncConnectionId,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<SyncOutcome> {
        self.worker
            .send_message_update(sync_connection_id, Provider::Discord, hazel_message_id, dedupe_key)
            .await
    }

    pub async fn send_message_delete(
        &self,
        sync_connection_id: SyncConnectionId,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<SyncOutcome> {
        self.worker
            .send_message_delete(sync_connection_id, Provider::Discord, hazel_message_id, dedupe_key)
            .await
    }

    pub async fn fan_out_create(
        &self,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<FanoutSummary> {
        self.fanout
            .sync_hazel_message_create_to_all_connections(Provider::Discord, hazel_message_id, dedupe_key)
            .await
    }

    pub async fn fan_out_update(
        &self,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<FanoutSummary> {
        self.fanout
            .sync_hazel_message_update_to_all_connections(Provider::Discord, hazel_message_id, dedupe_key)
            .await
    }

    pub async fn fan_out_delete(
        &self,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<FanoutSummary> {
        self.fanout
            .sync_hazel_message_delete_to_all_connections(Provider::Discord, hazel_message_id, dedupe_key)
            .await
    }
}
