//! Outbound Fan-out Dispatcher (spec §2.5, §4.5).
//!
//! Mirrors one internal change to every eligible outbound target across
//! connections: for a changed Hazel message, finds all active
//! outbound-eligible channel links for `(hazelChannelId, provider)` and
//! invokes the matching outbound verb of `ChatSyncCoreWorker` per target,
//! reusing the same dedupe key across connections (spec §4.5 step 3).

use std::sync::Arc;

use chatsync_types::{HazelMessageId, Provider, SyncResult};
use tracing::{error, info};

use crate::worker::ChatSyncCoreWorker;

/// `{synced, failed}` aggregate returned by every fan-out verb (spec §4.5
/// step 4). Per-target errors are logged and counted, never propagated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub synced: u32,
    pub failed: u32,
}

/// Which outbound verb to invoke per target — the three outbound verbs of
/// §4.4.4-§4.4.5 share an identical fan-out shape, differing only in which
/// verb is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutboundVerb {
    Create,
    Update,
    Delete,
}

pub struct FanoutDispatcher {
    worker: Arc<ChatSyncCoreWorker>,
}

impl FanoutDispatcher {
    pub fn new(worker: Arc<ChatSyncCoreWorker>) -> Self {
        Self { worker }
    }

    pub async fn sync_hazel_message_create_to_all_connections(
        &self,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<FanoutSummary> {
        self.fan_out(provider, hazel_message_id, dedupe_key, OutboundVerb::Create)
            .await
    }

    pub async fn sync_hazel_message_update_to_all_connections(
        &self,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<FanoutSummary> {
        self.fan_out(provider, hazel_message_id, dedupe_key, OutboundVerb::Update)
            .await
    }

    pub async fn sync_hazel_message_delete_to_all_connections(
        &self,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<FanoutSummary> {
        self.fan_out(provider, hazel_message_id, dedupe_key, OutboundVerb::Delete)
            .await
    }

    async fn fan_out(
        &self,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
        verb: OutboundVerb,
    ) -> SyncResult<FanoutSummary> {
        // Step 1: load the message; absent is a no-op, not an error — the
        // source-of-truth side is assumed to validate (spec §4.5 step 1).
        let Some(message) = self.worker.messages.find_by_id(&hazel_message_id).await? else {
            return Ok(FanoutSummary::default());
        };

        // Step 2: active outbound targets for (hazelChannelId, provider).
        let candidates = self
            .worker
            .channel_links
            .find_active_by_hazel_channel(&message.channel_id)
            .await?;

        let mut summary = FanoutSummary::default();

        for link in candidates {
            if !link.direction.allows_outbound() {
                continue;
            }

            let connection = match self.worker.connections.find_by_id(link.sync_connection_id).await? {
                Some(connection) => connection,
                None => continue,
            };
            if connection.provider != provider || !connection.is_active() {
                continue;
            }

            let outcome = match verb {
                OutboundVerb::Create => {
                    self.worker
                        .send_message_create(
                            link.sync_connection_id,
                            provider,
                            hazel_message_id.clone(),
                            dedupe_key.clone(),
                        )
                        .await
                }
                OutboundVerb::Update => {
                    self.worker
                        .send_message_update(
                            link.sync_connection_id,
                            provider,
                            hazel_message_id.clone(),
                            dedupe_key.clone(),
                        )
                        .await
                }
                OutboundVerb::Delete => {
                    self.worker
                        .send_message_delete(
                            link.sync_connection_id,
                            provider,
                            hazel_message_id.clone(),
                            dedupe_key.clone(),
                        )
                        .await
                }
            };

            match outcome {
                Ok(outcome) if !outcome.is_benign_skip() => {
                    summary.synced += 1;
                    info!(
                        connection = %link.sync_connection_id,
                        hazel_message_id = %hazel_message_id,
                        "fanned-out outbound verb"
                    );
                }
                Ok(_) => {
                    // Benign short-circuit (deduped/already-linked/etc): not a
                    // failure, but not a fresh sync either — spec §4.5 only
                    // tallies `{synced, failed}`, so these fall through
                    // uncounted, matching scenario 5's aggregate shape.
                }
                Err(err) => {
                    summary.failed += 1;
                    error!(
                        provider = %provider,
                        connection = %link.sync_connection_id,
                        hazel_message_id = %hazel_message_id,
                        %err,
                        "fan-out target failed"
                    );
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatsync_provider::AdapterRegistry;
    use chatsync_types::{
        ConnectionStatus, HazelChannelId, HazelOrganizationId, HazelUserId, Provider,
        SyncChannelLink, SyncChannelLinkId, SyncConnection, SyncConnectionId, SyncDirection,
    };
    use chrono::Utc;

    use super::*;
    use crate::testutil::fakes::{
        FakeBotService, FakeEventReceiptRepo, FakeIntegrationConnectionRepo, FakeMessageRepo,
        FakeOrgMemberRepo, FakeSyncChannelLinkRepo, FakeSyncConnectionRepo, FakeSyncMessageLinkRepo,
        FakeUserRepo,
    };

    fn make_connection(provider: Provider) -> SyncConnection {
        SyncConnection {
            id: SyncConnectionId::new(),
            organization_id: HazelOrganizationId::new("org-1"),
            provider,
            external_workspace_id: "ws".into(),
            status: ConnectionStatus::Active,
            last_synced_at: None,
            created_by: HazelUserId::new("admin"),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn make_link(connection_id: SyncConnectionId, hazel_channel: &HazelChannelId, external: &str) -> SyncChannelLink {
        SyncChannelLink {
            id: SyncChannelLinkId::new(),
            sync_connection_id: connection_id,
            hazel_channel_id: hazel_channel.clone(),
            external_channel_id: external.into(),
            direction: SyncDirection::Both,
            is_active: true,
            last_synced_at: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    async fn worker_with(
        connections: Arc<FakeSyncConnectionRepo>,
        channel_links: Arc<FakeSyncChannelLinkRepo>,
        message_links: Arc<FakeSyncMessageLinkRepo>,
        messages: Arc<FakeMessageRepo>,
        adapters: Arc<AdapterRegistry>,
    ) -> Arc<ChatSyncCoreWorker> {
        Arc::new(ChatSyncCoreWorker::new(
            connections,
            channel_links,
            message_links,
            Arc::new(FakeEventReceiptRepo::new()),
            messages,
            Arc::new(FakeIntegrationConnectionRepo::new()),
            Arc::new(FakeUserRepo::new()),
            Arc::new(FakeOrgMemberRepo::new()),
            Arc::new(FakeBotService::new()),
            adapters,
        ))
    }

    #[tokio::test]
    async fn fans_out_to_two_connections_scenario_5() {
        use crate::testutil::fakes::FakeAdapter;

        let hazel_channel = HazelChannelId::new("hazel-chan-1");

        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let author = HazelUserId::new("author-1");
        let message_id = messages.seed(&hazel_channel, &author, "hello world");

        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let c1 = connections.insert(make_connection(Provider::Discord));
        let c2 = connections.insert(make_connection(Provider::Discord));

        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        channel_links.insert(make_link(c1, &hazel_channel, "ext-1"));
        channel_links.insert(make_link(c2, &hazel_channel, "ext-2"));

        let mut registry = AdapterRegistry::new();
        registry.register(Provider::Discord, Arc::new(FakeAdapter::new()));
        let adapters = Arc::new(registry);

        let worker = worker_with(connections, channel_links, message_links.clone(), messages, adapters).await;
        let dispatcher = FanoutDispatcher::new(worker);

        let summary = dispatcher
            .sync_hazel_message_create_to_all_connections(Provider::Discord, message_id, Some("k".to_string()))
            .await
            .unwrap();

        assert_eq!(summary, FanoutSummary { synced: 2, failed: 0 });
        assert_eq!(message_links.all().len(), 2);
    }

    #[tokio::test]
    async fn missing_message_is_a_no_op_not_an_error() {
        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        let adapters = Arc::new(AdapterRegistry::new());

        let worker = worker_with(connections, channel_links, message_links, messages, adapters).await;
        let dispatcher = FanoutDispatcher::new(worker);

        let summary = dispatcher
            .sync_hazel_message_create_to_all_connections(
                Provider::Discord,
                HazelMessageId::new("does-not-exist"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(summary, FanoutSummary::default());
    }

    #[tokio::test]
    async fn direction_filter_excludes_external_to_hazel_links() {
        use crate::testutil::fakes::FakeAdapter;

        let hazel_channel = HazelChannelId::new("hazel-chan-2");
        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let author = HazelUserId::new("author-1");
        let message_id = messages.seed(&hazel_channel, &author, "hello");

        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let c1 = connections.insert(make_connection(Provider::Discord));

        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        let mut link = make_link(c1, &hazel_channel, "ext-1");
        link.direction = SyncDirection::ExternalToHazel;
        channel_links.insert(link);

        let mut registry = AdapterRegistry::new();
        registry.register(Provider::Discord, Arc::new(FakeAdapter::new()));

        let worker = worker_with(
            connections,
            channel_links,
            message_links.clone(),
            messages,
            Arc::new(registry),
        )
        .await;
        let dispatcher = FanoutDispatcher::new(worker);

        let summary = dispatcher
            .sync_hazel_message_create_to_all_connections(Provider::Discord, message_id, None)
            .await
            .unwrap();

        assert_eq!(summary, FanoutSummary::default());
        assert!(message_links.all().is_empty());
    }
}
