//! Backfill Scanner (spec §2.6, §4.4.6, §4.6).
//!
//! Catch-up mirroring of Hazel messages that were created while no channel
//! link existed, or while the engine was offline. Owned by the worker
//! itself since it shares the worker's outbound verbs.

use std::sync::Arc;

use chatsync_types::{Provider, SyncConnectionId, SyncResult};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::worker::ChatSyncCoreWorker;

/// `{sent, skipped, failed}` aggregate for a single connection's backfill
/// pass (spec §4.4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionBackfillSummary {
    pub sent: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Bounds concurrency across connections at ≤5 (spec §4.6, §5).
const BACKFILL_FANOUT_CONCURRENCY: usize = 5;

pub struct BackfillScanner {
    worker: Arc<ChatSyncCoreWorker>,
}

impl BackfillScanner {
    pub fn new(worker: Arc<ChatSyncCoreWorker>) -> Self {
        Self { worker }
    }

    /// Connection-scoped backfill (spec §4.4.6). Inactive connections yield
    /// a zero-result rather than an error.
    pub async fn sync_connection(
        &self,
        connection_id: SyncConnectionId,
        max_messages_per_channel: i64,
    ) -> SyncResult<ConnectionBackfillSummary> {
        let connection = match self.worker.connections.find_by_id(connection_id).await? {
            Some(connection) if connection.is_active() => connection,
            _ => return Ok(ConnectionBackfillSummary::default()),
        };

        let links = self
            .worker
            .channel_links
            .find_active_by_sync_connection(connection_id)
            .await?;

        let mut summary = ConnectionBackfillSummary::default();

        for link in links {
            let unmirrored = self
                .worker
                .messages
                .find_unmirrored_for_channel_link(
                    &link.hazel_channel_id,
                    link.id,
                    max_messages_per_channel,
                )
                .await?;

            for message in unmirrored {
                let outcome = self
                    .worker
                    .send_message_create(connection_id, connection.provider, message.id.clone(), None)
                    .await;

                match outcome {
                    Ok(outcome) if !outcome.is_benign_skip() => summary.sent += 1,
                    Ok(_) => summary.skipped += 1,
                    Err(err) => {
                        summary.failed += 1;
                        error!(
                            connection = %connection_id,
                            message_id = %message.id,
                            %err,
                            "backfill send failed"
                        );
                    }
                }
            }
        }

        info!(
            connection = %connection_id,
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            "connection backfill complete"
        );

        Ok(summary)
    }

    /// All active connections of a provider, at bounded concurrency ≤5
    /// (spec §4.6).
    pub async fn sync_all_active_connections(
        &self,
        provider: Provider,
        max_messages_per_channel: i64,
    ) -> SyncResult<Vec<(SyncConnectionId, ConnectionBackfillSummary)>> {
        let connections = self.worker.connections.find_active_by_provider(provider).await?;
        let semaphore = Arc::new(Semaphore::new(BACKFILL_FANOUT_CONCURRENCY));

        let mut handles = Vec::with_capacity(connections.len());
        for connection in connections {
            let worker = self.worker.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("backfill semaphore never closed");
                let scanner = BackfillScanner::new(worker);
                let summary = scanner
                    .sync_connection(connection.id, max_messages_per_channel)
                    .await;
                (connection.id, summary)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((connection_id, Ok(summary))) => results.push((connection_id, summary)),
                Ok((connection_id, Err(err))) => {
                    error!(connection = %connection_id, %err, "backfill failed for connection");
                    results.push((connection_id, ConnectionBackfillSummary::default()));
                }
                Err(join_err) => {
                    error!(%join_err, "backfill task panicked");
                }
            }
        }

        Ok(results)
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
        FakeAdapter, FakeBotService, FakeEventReceiptRepo, FakeIntegrationConnectionRepo,
        FakeMessageRepo, FakeOrgMemberRepo, FakeSyncChannelLinkRepo, FakeSyncConnectionRepo,
        FakeSyncMessageLinkRepo, FakeUserRepo,
    };

    fn make_connection() -> SyncConnection {
        SyncConnection {
            id: SyncConnectionId::new(),
            organization_id: HazelOrganizationId::new("org-1"),
            provider: Provider::Discord,
            external_workspace_id: "ws".into(),
            status: ConnectionStatus::Active,
            last_synced_at: None,
            created_by: HazelUserId::new("admin"),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn make_link(connection_id: SyncConnectionId, hazel_channel: &HazelChannelId) -> SyncChannelLink {
        SyncChannelLink {
            id: SyncChannelLinkId::new(),
            sync_connection_id: connection_id,
            hazel_channel_id: hazel_channel.clone(),
            external_channel_id: "ext-1".into(),
            direction: SyncDirection::Both,
            is_active: true,
            last_synced_at: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn backfills_unmirrored_messages_in_stable_order() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let author = HazelUserId::new("author-1");

        let m1 = messages.seed(&hazel_channel, &author, "first");
        let m2 = messages.seed(&hazel_channel, &author, "second");

        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let conn_id = connections.insert(make_connection());

        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        channel_links.insert(make_link(conn_id, &hazel_channel));

        let mut registry = AdapterRegistry::new();
        registry.register(Provider::Discord, Arc::new(FakeAdapter::new()));

        let worker = Arc::new(ChatSyncCoreWorker::new(
            connections,
            channel_links,
            message_links.clone(),
            Arc::new(FakeEventReceiptRepo::new()),
            messages,
            Arc::new(FakeIntegrationConnectionRepo::new()),
            Arc::new(FakeUserRepo::new()),
            Arc::new(FakeOrgMemberRepo::new()),
            Arc::new(FakeBotService::new()),
            Arc::new(registry),
        ));

        let scanner = BackfillScanner::new(worker);
        let summary = scanner.sync_connection(conn_id, 50).await.unwrap();

        assert_eq!(summary, ConnectionBackfillSummary { sent: 2, skipped: 0, failed: 0 });
        assert!(message_links.is_mirrored(channel_links_id(&message_links, m1.clone()), &m1));
        let _ = m2;
    }

    // helper to avoid importing SyncChannelLinkId directly into the assertion above
    fn channel_links_id(
        message_links: &Arc<FakeSyncMessageLinkRepo>,
        hazel_message_id: chatsync_types::HazelMessageId,
    ) -> SyncChannelLinkId {
        message_links
            .all()
            .into_iter()
            .find(|l| l.hazel_message_id == hazel_message_id)
            .map(|l| l.channel_link_id)
            .expect("message should be mirrored")
    }

    #[tokio::test]
    async fn inactive_connection_is_a_zero_result() {
        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let mut inactive = make_connection();
        inactive.status = ConnectionStatus::Inactive;
        let conn_id = connections.insert(inactive);

        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        let registry = AdapterRegistry::new();

        let worker = Arc::new(ChatSyncCoreWorker::new(
            connections,
            channel_links,
            message_links,
            Arc::new(FakeEventReceiptRepo::new()),
            messages,
            Arc::new(FakeIntegrationConnectionRepo::new()),
            Arc::new(FakeUserRepo::new()),
            Arc::new(FakeOrgMemberRepo::new()),
            Arc::new(FakeBotService::new()),
            Arc::new(registry),
        ));

        let scanner = BackfillScanner::new(worker);
        let summary = scanner.sync_connection(conn_id, 50).await.unwrap();
        assert_eq!(summary, ConnectionBackfillSummary::default());
    }

    #[tokio::test]
    async fn sync_all_active_connections_bounds_concurrency_and_aggregates() {
        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());

        let mut conn_ids = Vec::new();
        for i in 0..7 {
            let conn_id = connections.insert(make_connection());
            let hazel_channel = HazelChannelId::new(format!("hazel-chan-{i}"));
            messages.seed(&hazel_channel, &HazelUserId::new("author"), "hi");
            channel_links.insert(make_link(conn_id, &hazel_channel));
            conn_ids.push(conn_id);
        }

        let mut registry = AdapterRegistry::new();
        registry.register(Provider::Discord, Arc::new(FakeAdapter::new()));

        let worker = Arc::new(ChatSyncCoreWorker::new(
            connections,
            channel_links,
            message_links,
            Arc::new(FakeEventReceiptRepo::new()),
            messages,
            Arc::new(FakeIntegrationConnectionRepo::new()),
            Arc::new(FakeUserRepo::new()),
            Arc::new(FakeOrgMemberRepo::new()),
            Arc::new(FakeBotService::new()),
            Arc::new(registry),
        ));

        let scanner = BackfillScanner::new(worker);
        let results = scanner
            .sync_all_active_connections(Provider::Discord, 50)
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        for (_, summary) in &results {
            assert_eq!(summary.sent, 1);
        }
    }
}
