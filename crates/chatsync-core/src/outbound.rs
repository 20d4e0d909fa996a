//! Outbound verbs: Hazel -> external (spec §4.4.4-§4.4.5).

use chatsync_provider::adapter::{CreateMessageRequest, DeleteMessageRequest, UpdateMessageRequest};
use chatsync_types::{
    HazelMessageId, NewSyncMessageLink, Provider, SyncConnectionId, SyncError, SyncOutcome,
    SyncResult, SyncSource,
};
use serde::Serialize;

use crate::hash::payload_hash;
use crate::worker::ChatSyncCoreWorker;

/// Common payload committed on outbound `create` success, hashed for the
/// receipt row's `payloadHash` (spec §4.4.4 step 8).
#[derive(Serialize)]
struct OutboundCreatePayload<'a> {
    hazel_message_id: &'a str,
    external_message_id: &'a str,
}

impl ChatSyncCoreWorker {
    /// Outbound `create` (spec §4.4.4).
    pub async fn send_message_create(
        &self,
        sync_connection_id: SyncConnectionId,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<SyncOutcome> {
        let dedupe_key =
            dedupe_key.unwrap_or_else(|| format!("hazel:message:create:{hazel_message_id}"));

        if !self
            .receipts
            .claim(sync_connection_id, SyncSource::Hazel, &dedupe_key, None)
            .await?
        {
            return Ok(SyncOutcome::Deduped);
        }

        let connection = match self
            .load_active_connection(sync_connection_id, provider)
            .await?
        {
            Ok(connection) => connection,
            Err(outcome) => {
                self.commit_ignored(sync_connection_id, SyncSource::Hazel, &dedupe_key, None)
                    .await?;
                return Ok(outcome);
            }
        };

        let message = self
            .messages
            .find_by_id(&hazel_message_id)
            .await?
            .ok_or_else(|| SyncError::MessageNotFound(hazel_message_id.to_string()))?;

        let link = self
            .channel_links
            .find_by_hazel_channel(sync_connection_id, &message.channel_id)
            .await?
            .ok_or_else(|| SyncError::ChannelLinkNotFound {
                connection: sync_connection_id.to_string(),
                external_channel_id: message.channel_id.to_string(),
            })?;

        if self
            .message_links
            .find_by_hazel_message(link.id, &hazel_message_id)
            .await?
            .is_some_and(|existing| existing.is_live())
        {
            self.commit_ignored(sync_connection_id, SyncSource::Hazel, &dedupe_key, Some(link.id))
                .await?;
            return Ok(SyncOutcome::AlreadyLinked);
        }

        let adapter = self.adapters.get(connection.provider)?;
        let external_message_id = adapter
            .create_message(CreateMessageRequest {
                external_channel_id: link.external_channel_id.clone(),
                content: message.content.clone(),
                reply_to_external_message_id: None,
            })
            .await?;

        self.message_links
            .insert(NewSyncMessageLink {
                channel_link_id: link.id,
                hazel_message_id: hazel_message_id.clone(),
                external_message_id: external_message_id.clone(),
                source: SyncSource::Hazel,
                hazel_thread_id: None,
                external_thread_id: None,
                root_hazel_message_id: None,
            })
            .await?;

        let payload_hash = payload_hash(&OutboundCreatePayload {
            hazel_message_id: hazel_message_id.as_str(),
            external_message_id: external_message_id.as_str(),
        });

        self.commit_processed(
            sync_connection_id,
            SyncSource::Hazel,
            &dedupe_key,
            payload_hash,
            Some(link.id),
        )
        .await?;
        self.heartbeat(sync_connection_id, link.id).await;

        Ok(SyncOutcome::Synced { external_message_id })
    }

    /// Outbound `update` (spec §4.4.5).
    pub async fn send_message_update(
        &self,
        sync_connection_id: SyncConnectionId,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<SyncOutcome> {
        let dedupe_key =
            dedupe_key.unwrap_or_else(|| format!("hazel:message:update:{hazel_message_id}"));

        if !self
            .receipts
            .claim(sync_connection_id, SyncSource::Hazel, &dedupe_key, None)
            .await?
        {
            return Ok(SyncOutcome::Deduped);
        }

        let connection = match self
            .load_active_connection(sync_connection_id, provider)
            .await?
        {
            Ok(connection) => connection,
            Err(outcome) => {
                self.commit_ignored(sync_connection_id, SyncSource::Hazel, &dedupe_key, None)
                    .await?;
                return Ok(outcome);
            }
        };

        let message = self
            .messages
            .find_by_id(&hazel_message_id)
            .await?
            .ok_or_else(|| SyncError::MessageNotFound(hazel_message_id.to_string()))?;

        let link = self
            .channel_links
            .find_by_hazel_channel(sync_connection_id, &message.channel_id)
            .await?
            .ok_or_else(|| SyncError::ChannelLinkNotFound {
                connection: sync_connection_id.to_string(),
                external_channel_id: message.channel_id.to_string(),
            })?;

        let existing = self
            .message_links
            .find_by_hazel_message(link.id, &hazel_message_id)
            .await?
            .filter(|m| m.is_live());

        let Some(existing) = existing else {
            self.commit_ignored(sync_connection_id, SyncSource::Hazel, &dedupe_key, Some(link.id))
                .await?;
            return Ok(SyncOutcome::IgnoredMissingLink);
        };

        let adapter = self.adapters.get(connection.provider)?;
        adapter
            .update_message(UpdateMessageRequest {
                external_channel_id: link.external_channel_id.clone(),
                external_message_id: existing.external_message_id.clone(),
                content: message.content.clone(),
            })
            .await?;

        self.commit_processed(sync_connection_id, SyncSource::Hazel, &dedupe_key, None, Some(link.id))
            .await?;
        self.heartbeat(sync_connection_id, link.id).await;

        Ok(SyncOutcome::Updated)
    }

    /// Outbound `delete` (spec §4.4.5) — soft-deletes the message link once
    /// the remote delete succeeds.
    pub async fn send_message_delete(
        &self,
        sync_connection_id: SyncConnectionId,
        provider: Provider,
        hazel_message_id: HazelMessageId,
        dedupe_key: Option<String>,
    ) -> SyncResult<SyncOutcome> {
        let dedupe_key =
            dedupe_key.unwrap_or_else(|| format!("hazel:message:delete:{hazel_message_id}"));

        if !self
            .receipts
            .claim(sync_connection_id, SyncSource::Hazel, &dedupe_key, None)
            .await?
        {
            return Ok(SyncOutcome::Deduped);
        }

        let connection = match self
            .load_active_connection(sync_connection_id, provider)
            .await?
        {
            Ok(connection) => connection,
            Err(outcome) => {
                self.commit_ignored(sync_connection_id, SyncSource::Hazel, &dedupe_key, None)
                    .await?;
                return Ok(outcome);
            }
        };

        let message = self
            .messages
            .find_by_id(&hazel_message_id)
            .await?
            .ok_or_else(|| SyncError::MessageNotFound(hazel_message_id.to_string()))?;

        let link = self
            .channel_links
            .find_by_hazel_channel(sync_connection_id, &message.channel_id)
            .await?
            .ok_or_else(|| SyncError::ChannelLinkNotFound {
                connection: sync_connection_id.to_string(),
                external_channel_id: message.channel_id.to_string(),
            })?;

        let existing = self
            .message_links
            .find_by_hazel_message(link.id, &hazel_message_id)
            .await?
            .filter(|m| m.is_live());

        let Some(existing) = existing else {
            self.commit_ignored(sync_connection_id, SyncSource::Hazel, &dedupe_key, Some(link.id))
                .await?;
            return Ok(SyncOutcome::IgnoredMissingLink);
        };

        let adapter = self.adapters.get(connection.provider)?;
        adapter
            .delete_message(DeleteMessageRequest {
                external_channel_id: link.external_channel_id.clone(),
                external_message_id: existing.external_message_id.clone(),
            })
            .await?;

        self.message_links.soft_delete(existing.id).await?;

        self.commit_processed(sync_connection_id, SyncSource::Hazel, &dedupe_key, None, Some(link.id))
            .await?;
        self.heartbeat(sync_connection_id, link.id).await;

        Ok(SyncOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatsync_provider::AdapterRegistry;
    use chatsync_types::{
        ConnectionStatus, HazelChannelId, HazelOrganizationId, HazelUserId, SyncChannelLink,
        SyncChannelLinkId, SyncConnection, SyncDirection,
    };
    use chrono::Utc;

    use super::*;
    use crate::repos::MessageRepo as _;
    use crate::testutil::fakes::{
        FakeAdapter, FakeBotService, FakeEventReceiptRepo, FakeIntegrationConnectionRepo,
        FakeMessageRepo, FakeOrgMemberRepo, FakeSyncChannelLinkRepo, FakeSyncConnectionRepo,
        FakeSyncMessageLinkRepo, FakeUserRepo,
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
        messages: Arc<FakeMessageRepo>,
        message_links: Arc<FakeSyncMessageLinkRepo>,
        receipts: Arc<FakeEventReceiptRepo>,
        adapter: Arc<FakeAdapter>,
    }

    fn harness_with_link(hazel_channel: &HazelChannelId, external_channel: &str) -> (Harness, SyncConnectionId) {
        let connections = Arc::new(FakeSyncConnectionRepo::new());
        let connection_id = SyncConnectionId::new();
        connections.insert(make_connection(connection_id, Provider::Discord));

        let channel_links = Arc::new(FakeSyncChannelLinkRepo::new());
        channel_links.insert(make_link(connection_id, hazel_channel, external_channel));

        let message_links = Arc::new(FakeSyncMessageLinkRepo::new());
        let messages = Arc::new(FakeMessageRepo::new(message_links.clone()));
        let receipts = Arc::new(FakeEventReceiptRepo::new());

        let adapter = Arc::new(FakeAdapter::new());
        let mut registry = AdapterRegistry::new();
        registry.register(Provider::Discord, adapter.clone());

        let worker = ChatSyncCoreWorker::new(
            connections,
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
                messages,
                message_links,
                receipts,
                adapter,
            },
            connection_id,
        )
    }

    // Scenario 4 (spec §8): outbound create then update.
    #[tokio::test]
    async fn outbound_create_then_update_scenario_4() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id) = harness_with_link(&hazel_channel, "ext-1");

        let author = HazelUserId::new("author-1");
        let message_id = h.messages.seed(&hazel_channel, &author, "hello");

        let created = h
            .worker
            .send_message_create(connection_id, Provider::Discord, message_id.clone(), None)
            .await
            .unwrap();

        let external_message_id = match created {
            SyncOutcome::Synced { external_message_id } => external_message_id,
            other => panic!("expected Synced, got {other:?}"),
        };

        assert_eq!(h.adapter.created.lock().len(), 1);
        let receipt = h
            .receipts
            .get(
                connection_id,
                SyncSource::Hazel,
                &format!("hazel:message:create:{message_id}"),
            )
            .expect("receipt committed");
        assert_eq!(receipt.status, chatsync_types::ReceiptStatus::Processed);
        assert!(receipt.payload_hash.is_some());

        h.messages.update_content(&message_id, "new content").await.unwrap();

        let updated = h
            .worker
            .send_message_update(connection_id, Provider::Discord, message_id.clone(), None)
            .await
            .unwrap();

        assert_eq!(updated, SyncOutcome::Updated);
        let update_calls = h.adapter.updated.lock();
        assert_eq!(update_calls.len(), 1);
        assert_eq!(update_calls[0].external_message_id, external_message_id);
        assert_eq!(update_calls[0].content, "new content");
    }

    #[tokio::test]
    async fn outbound_create_twice_is_already_linked() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id) = harness_with_link(&hazel_channel, "ext-1");

        let author = HazelUserId::new("author-1");
        let message_id = h.messages.seed(&hazel_channel, &author, "hello");

        let first = h
            .worker
            .send_message_create(connection_id, Provider::Discord, message_id.clone(), Some("k1".into()))
            .await
            .unwrap();
        assert!(matches!(first, SyncOutcome::Synced { .. }));

        let second = h
            .worker
            .send_message_create(connection_id, Provider::Discord, message_id, Some("k2".into()))
            .await
            .unwrap();
        assert_eq!(second, SyncOutcome::AlreadyLinked);
        assert_eq!(h.adapter.created.lock().len(), 1);
    }

    #[tokio::test]
    async fn outbound_create_missing_message_fails() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id) = harness_with_link(&hazel_channel, "ext-1");

        let err = h
            .worker
            .send_message_create(
                connection_id,
                Provider::Discord,
                HazelMessageId::new("does-not-exist"),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MessageNotFound(_)));
    }

    #[tokio::test]
    async fn outbound_delete_soft_deletes_message_link_and_calls_adapter() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id) = harness_with_link(&hazel_channel, "ext-1");

        let author = HazelUserId::new("author-1");
        let message_id = h.messages.seed(&hazel_channel, &author, "hello");

        h.worker
            .send_message_create(connection_id, Provider::Discord, message_id.clone(), None)
            .await
            .unwrap();

        let outcome = h
            .worker
            .send_message_delete(connection_id, Provider::Discord, message_id.clone(), None)
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Deleted);
        assert_eq!(h.adapter.deleted.lock().len(), 1);

        let live = h
            .message_links
            .all()
            .into_iter()
            .find(|l| l.hazel_message_id == message_id)
            .expect("link row remains");
        assert!(live.deleted_at.is_some());
    }

    #[tokio::test]
    async fn outbound_update_with_no_link_is_ignored_missing_link() {
        let hazel_channel = HazelChannelId::new("hazel-chan-1");
        let (h, connection_id) = harness_with_link(&hazel_channel, "ext-1");

        let author = HazelUserId::new("author-1");
        let message_id = h.messages.seed(&hazel_channel, &author, "hello");

        let outcome = h
            .worker
            .send_message_update(connection_id, Provider::Discord, message_id, None)
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::IgnoredMissingLink);
    }
}
