//! Ingress verbs: external -> Hazel (spec §4.4.1-§4.4.3).

use chatsync_types::{
    ExternalChannelId, ExternalMessageId, ExternalThreadId, HazelOrganizationId, NewHazelMessage,
    NewSyncMessageLink, Provider, SyncOutcome, SyncResult, SyncSource,
};
use tracing::info;

use crate::worker::ChatSyncCoreWorker;
use chatsync_types::SyncConnectionId;

/// Parameters for [`ChatSyncCoreWorker::ingest_message_create`].
#[derive(Debug, Clone)]
pub struct IngestMessageCreate {
    pub sync_connection_id: SyncConnectionId,
    pub provider: Provider,
    pub organization_id: HazelOrganizationId,
    pub external_channel_id: ExternalChannelId,
    pub external_message_id: ExternalMessageId,
    pub content: String,
    pub external_author_id: Option<String>,
    pub external_author_display_name: Option<String>,
    pub external_author_avatar_url: Option<String>,
    pub external_thread_id: Option<ExternalThreadId>,
    pub dedupe_key: Option<String>,
}

/// Parameters shared by [`ChatSyncCoreWorker::ingest_message_update`] and
/// [`ChatSyncCoreWorker::ingest_message_delete`].
#[derive(Debug, Clone)]
pub struct IngestMessageMutation {
    pub sync_connection_id: SyncConnectionId,
    pub provider: Provider,
    pub external_channel_id: ExternalChannelId,
    pub external_message_id: ExternalMessageId,
    pub content: Option<String>,
    pub dedupe_key: Option<String>,
}

impl ChatSyncCoreWorker {
    /// Ingress `create` (spec §4.4.1).
    pub async fn ingest_message_create(
        &self,
        params: IngestMessageCreate,
    ) -> SyncResult<SyncOutcome> {
        let dedupe_key = params
            .dedupe_key
            .clone()
            .unwrap_or_else(|| format!("external:message:create:{}", params.external_message_id));

        if !self
            .receipts
            .claim(params.sync_connection_id, SyncSource::External, &dedupe_key, None)
            .await?
        {
            return Ok(SyncOutcome::Deduped);
        }

        let connection = match self
            .load_active_connection(params.sync_connection_id, params.provider)
            .await?
        {
            Ok(connection) => connection,
            Err(outcome) => {
                self.commit_ignored(params.sync_connection_id, SyncSource::External, &dedupe_key, None)
                    .await?;
                return Ok(outcome);
            }
        };

        let link = match self
            .find_channel_link_by_external(
                params.sync_connection_id,
                SyncSource::External,
                &dedupe_key,
                &params.external_channel_id,
            )
            .await?
        {
            Ok(link) => link,
            Err(err) => return Err(err),
        };

        if let Some(existing) = self
            .message_links
            .find_by_external_message(link.id, &params.external_message_id)
            .await?
        {
            if existing.is_live() {
                self.commit_ignored(
                    params.sync_connection_id,
                    SyncSource::External,
                    &dedupe_key,
                    Some(link.id),
                )
                .await?;
                return Ok(SyncOutcome::AlreadyLinked);
            }
        }

        let author_id = match params.external_author_id.as_deref() {
            Some(external_author_id) => {
                self.identity
                    .resolve_author(
                        connection.provider,
                        &params.organization_id,
                        external_author_id,
                        params.external_author_display_name.as_deref(),
                        params.external_author_avatar_url.as_deref(),
                    )
                    .await?
            }
            None => {
                self.bot_service
                    .get_or_create_bot_user(connection.provider, &params.organization_id)
                    .await?
            }
        };

        let message = self
            .messages
            .insert(NewHazelMessage {
                channel_id: link.hazel_channel_id.clone(),
                author_id,
                content: params.content,
            })
            .await?;

        self.message_links
            .insert(NewSyncMessageLink {
                channel_link_id: link.id,
                hazel_message_id: message.id.clone(),
                external_message_id: params.external_message_id,
                source: SyncSource::External,
                hazel_thread_id: None,
                external_thread_id: params.external_thread_id,
                root_hazel_message_id: None,
            })
            .await?;

        self.commit_processed(
            params.sync_connection_id,
            SyncSource::External,
            &dedupe_key,
            None,
            Some(link.id),
        )
        .await?;
        self.heartbeat(params.sync_connection_id, link.id).await;

        info!(
            connection = %params.sync_connection_id,
            hazel_message_id = %message.id,
            "ingested external message create"
        );

        Ok(SyncOutcome::Created {
            hazel_message_id: message.id,
        })
    }

    /// Ingress `update` (spec §4.4.2).
    pub async fn ingest_message_update(
        &self,
        params: IngestMessageMutation,
    ) -> SyncResult<SyncOutcome> {
        let dedupe_key = params
            .dedupe_key
            .clone()
            .unwrap_or_else(|| format!("external:message:update:{}", params.external_message_id));

        if !self
            .receipts
            .claim(params.sync_connection_id, SyncSource::External, &dedupe_key, None)
            .await?
        {
            return Ok(SyncOutcome::Deduped);
        }

        let _connection = match self
            .load_active_connection(params.sync_connection_id, params.provider)
            .await?
        {
            Ok(connection) => connection,
            Err(outcome) => {
                self.commit_ignored(params.sync_connection_id, SyncSource::External, &dedupe_key, None)
                    .await?;
                return Ok(outcome);
            }
        };

        let link = match self
            .find_channel_link_by_external(
                params.sync_connection_id,
                SyncSource::External,
                &dedupe_key,
                &params.external_channel_id,
            )
            .await?
        {
            Ok(link) => link,
            Err(err) => return Err(err),
        };

        let existing = self
            .message_links
            .find_by_external_message(link.id, &params.external_message_id)
            .await?
            .filter(|link| link.is_live());

        let Some(existing) = existing else {
            self.commit_ignored(
                params.sync_connection_id,
                SyncSource::External,
                &dedupe_key,
                Some(link.id),
            )
            .await?;
            return Ok(SyncOutcome::IgnoredMissingLink);
        };

        if let Some(content) = params.content {
            self.messages
                .update_content(&existing.hazel_message_id, &content)
                .await?;
        }

        self.commit_processed(
            params.sync_connection_id,
            SyncSource::External,
            &dedupe_key,
            None,
            Some(link.id),
        )
        .await?;
        self.heartbeat(params.sync_connection_id, link.id).await;

        Ok(SyncOutcome::Updated)
    }

    /// Ingress `delete` (spec §4.4.3).
    ///
    /// The `SyncMessageLink` is deliberately *not* soft-deleted here — only
    /// outbound delete retires the mapping (spec §4.4.3, last sentence).
    pub async fn ingest_message_delete(
        &self,
        params: IngestMessageMutation,
    ) -> SyncResult<SyncOutcome> {
        let dedupe_key = params
            .dedupe_key
            .clone()
            .unwrap_or_else(|| format!("external:message:delete:{}", params.external_message_id));

        if !self
            .receipts
            .claim(params.sync_connection_id, SyncSource::External, &dedupe_key, None)
            .await?
        {
            return Ok(SyncOutcome::Deduped);
        }

        let _connection = match self
            .load_active_connection(params.sync_connection_id, params.provider)
            .await?
        {
            Ok(connection) => connection,
            Err(outcome) => {
                self.commit_ignored(params.sync_connection_id, SyncSource::External, &dedupe_key, None)
                    .await?;
                return Ok(outcome);
            }
        };

        let link = match self
            .find_channel_link_by_external(
                params.sync_connection_id,
                SyncSource::External,
                &dedupe_key,
                &params.external_channel_id,
            )
            .await?
        {
            Ok(link) => link,
            Err(err) => return Err(err),
        };

        let existing = self
            .message_links
            .find_by_external_message(link.id, &params.external_message_id)
            .await?
            .filter(|link| link.is_live());

        let Some(existing) = existing else {
            self.commit_ignored(
                params.sync_connection_id,
                SyncSource::External,
                &dedupe_key,
                Some(link.id),
            )
            .await?;
            return Ok(SyncOutcome::IgnoredMissingLink);
        };

        self.messages
            .soft_delete(&existing.hazel_message_id, chrono::Utc::now())
            .await?;

        self.commit_processed(
            params.sync_connection_id,
            SyncSource::External,
            &dedupe_key,
            None,
            Some(link.id),
        )
        .await?;
        self.heartbeat(params.sync_connection_id, link.id).await;

        Ok(SyncOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatsync_provider::AdapterRegistry;
    use chatsync_types::{
        ConnectionStatus, HazelChannelId, HazelOrganizationId, HazelUserId, SyncChannelLink,
        SyncChannelLinkId, SyncConnection, SyncConnectionId, SyncDirection, SyncError,
    };
    use chrono::Utc;

    use super::*;
    use crate::testutil::fakes::{
        FakeBotService, FakeEventReceiptRepo, FakeIntegrationConnectionRepo, FakeMessageRepo,
        FakeOrgMemberRepo, FakeSyncChannelLinkRepo, FakeSyncConnectionRepo, FakeSyncMessageLinkRepo,
        FakeUserRepo,
    };

    fn make_connection(id: SyncConnectionId, provider: Provider) -> SyncConnection {
        SyncConnection {
            id,
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

    struct Harness {
        worker: ChatSyncCoreWorker,
        connections: Arc<FakeSyncConnectionRepo>,
        message_links: Arc<FakeSyncMessageLinkRepo>,
        messages: Arc<FakeMessageRepo>,
        receipts: Arc<FakeEventReceiptRepo>,
    }

    fn harness_with_link(hazel_channel: &HazelChannelId, external_channel: &str) -> (Harness, SyncConnectionId, SyncChannelLinkId) {
        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let connection_id = SyncConnectionId::new();
        connections.insert(make_connection(connection_id, Provider::Discord));

        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        let link_id = channel_links.insert(make_link(connection_id, hazel_channel, external_channel));

        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let receipts = Arc::new(FakeEventReceiptRepo::new());

        let mut registry = AdapterRegistry::new();
        use crate::testutil::fakes::FakeAdapter;
        registry.register(Provider::Discord, Arc::new(FakeAdapter::new()));

        let worker = ChatSyncCoreWorker::new(
            connections.clone(),
            channel_links,
            message_links.clone(),
            receipts.clone(),
            messages.clone(),
            Arc::new(FakeIntegrationConnectionRepo::new()),
            Arc::new(FakeUserRepo::new()),
            Arc::new(FakeOrgMemberRepo::new()),
            Arc::new(FakeBotService::new()),
            Arc::new(registry),
        );

        (
            Harness {
                worker,
                connections,
                message_links,
                messages,
                receipts,
            },
            connection_id,
            link_id,
        )
    }

    fn create_params(
        connection_id: SyncConnectionId,
        external_channel: &str,
        external_message: &str,
        dedupe_key: &str,
    ) -> IngestMessageCreate {
        IngestMessageCreate {
            sync_connection_id: connection_id,
            provider: Provider::Discord,
            organization_id: HazelOrganizationId::new("org-1"),
            external_channel_id: external_channel.into(),
            external_message_id: external_message.into(),
            content: "hello".into(),
            external_author_id: None,
            external_author_display_name: None,
            external_author_avatar_url: None,
            external_thread_id: None,
            dedupe_key: Some(dedupe_key.to_string()),
        }
    }

    // Scenario 1 (spec §8): fresh inbound create.
    #[tokio::test]
    async fn fresh_inbound_create_inserts_message_and_link_scenario_1() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, link_id) = harness_with_link(&hazel_channel, "ext-1");

        let outcome = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();

        let hazel_message_id = match outcome {
            SyncOutcome::Created { hazel_message_id } => hazel_message_id,
            other => panic!("expected Created, got {other:?}"),
        };

        let message = h.messages.get(&hazel_message_id).expect("message inserted");
        assert_eq!(message.content, "hello");
        assert_eq!(message.channel_id, hazel_channel);

        assert!(h
            .message_links
            .is_mirrored(link_id, &hazel_message_id));

        let receipt = h
            .receipts
            .get(connection_id, SyncSource::External, "k1")
            .expect("receipt committed");
        assert_eq!(receipt.status, chatsync_types::ReceiptStatus::Processed);

        assert!(h.connections.last_synced_at(connection_id).is_some());
    }

    // Scenario 2 (spec §8): duplicate inbound with same dedupe key is a no-op.
    #[tokio::test]
    async fn duplicate_dedupe_key_is_deduped_scenario_2() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, _link_id) = harness_with_link(&hazel_channel, "ext-1");

        let first = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();
        assert!(matches!(first, SyncOutcome::Created { .. }));

        let messages_before = h.message_links.all().len();

        let second = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();

        assert_eq!(second, SyncOutcome::Deduped);
        assert_eq!(h.message_links.all().len(), messages_before);
    }

    // Scenario 3 (spec §8): different dedupe key, same external message id
    // already mirrored -> `already_linked`, receipt `ignored`.
    #[tokio::test]
    async fn same_external_message_different_dedupe_key_is_already_linked_scenario_3() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, _link_id) = harness_with_link(&hazel_channel, "ext-1");

        let first = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();
        assert!(matches!(first, SyncOutcome::Created { .. }));

        let links_before = h.message_links.all().len();

        let second = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k2"))
            .await
            .unwrap();

        assert_eq!(second, SyncOutcome::AlreadyLinked);
        assert_eq!(h.message_links.all().len(), links_before);

        let receipt = h
            .receipts
            .get(connection_id, SyncSource::External, "k2")
            .expect("receipt committed");
        assert_eq!(receipt.status, chatsync_types::ReceiptStatus::Ignored);
    }

    #[tokio::test]
    async fn inactive_connection_is_ignored_without_claim_loss() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, _link_id) = harness_with_link(&hazel_channel, "ext-1");

        h.connections.set_status(connection_id, ConnectionStatus::Inactive);

        let outcome = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::IgnoredConnectionInactive);
        assert!(h.message_links.all().is_empty());
    }

    #[tokio::test]
    async fn missing_channel_link_fails_and_commits_receipt_failed() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, _link_id) = harness_with_link(&hazel_channel, "ext-1");

        let err = h
            .worker
            .ingest_message_create(create_params(connection_id, "unknown-channel", "m1", "k1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::ChannelLinkNotFound { .. }));

        let receipt = h
            .receipts
            .get(connection_id, SyncSource::External, "k1")
            .expect("receipt committed");
        assert_eq!(receipt.status, chatsync_types::ReceiptStatus::Failed);
    }

    // Spec §9 Open Question 1: a retry after `ChannelLinkNotFound` must
    // actually succeed once the link exists, not dedupe forever.
    #[tokio::test]
    async fn retry_after_missing_channel_link_succeeds_once_link_exists() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, _link_id) = harness_with_link(&hazel_channel, "ext-1");

        let first = h
            .worker
            .ingest_message_create(create_params(connection_id, "unknown-channel", "m1", "k1"))
            .await
            .unwrap_err();
        assert!(matches!(first, SyncError::ChannelLinkNotFound { .. }));

        let failed_receipt = h
            .receipts
            .get(connection_id, SyncSource::External, "k1")
            .expect("receipt committed failed");
        assert_eq!(failed_receipt.status, chatsync_types::ReceiptStatus::Failed);

        // The missing link now exists under the channel id the retry uses.
        let retry = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();

        assert!(matches!(retry, SyncOutcome::Created { .. }));
        let receipt = h
            .receipts
            .get(connection_id, SyncSource::External, "k1")
            .expect("receipt committed");
        assert_eq!(receipt.status, chatsync_types::ReceiptStatus::Processed);
    }

    #[tokio::test]
    async fn update_with_no_existing_link_is_ignored_missing_link() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, _link_id) = harness_with_link(&hazel_channel, "ext-1");

        let outcome = h
            .worker
            .ingest_message_update(IngestMessageMutation {
                sync_connection_id: connection_id,
                provider: Provider::Discord,
                external_channel_id: "ext-1".into(),
                external_message_id: "never-seen".into(),
                content: Some("edited".into()),
                dedupe_key: Some("u1".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::IgnoredMissingLink);
    }

    #[tokio::test]
    async fn delete_soft_deletes_message_but_keeps_message_link_live() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id, link_id) = harness_with_link(&hazel_channel, "ext-1");

        let created = h
            .worker
            .ingest_message_create(create_params(connection_id, "ext-1", "m1", "k1"))
            .await
            .unwrap();
        let hazel_message_id = match created {
            SyncOutcome::Created { hazel_message_id } => hazel_message_id,
            other => panic!("expected Created, got {other:?}"),
        };

        let outcome = h
            .worker
            .ingest_message_delete(IngestMessageMutation {
                sync_connection_id: connection_id,
                provider: Provider::Discord,
                external_channel_id: "ext-1".into(),
                external_message_id: "m1".into(),
                content: None,
                dedupe_key: Some("d1".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Deleted);

        let message = h.messages.get(&hazel_message_id).unwrap();
        assert!(message.deleted_at.is_some());

        // Spec §4.4.3: the SyncMessageLink itself is *not* soft-deleted here.
        assert!(h.message_links.is_mirrored(link_id, &hazel_message_id));
    }
}
