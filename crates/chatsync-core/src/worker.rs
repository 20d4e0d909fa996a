//! The Sync Core Worker (spec §2.4, §4.4) — the provider-agnostic verbs
//! every other component in this crate is built on top of.

use std::sync::Arc;

use chatsync_provider::AdapterRegistry;
use chatsync_types::{
    Provider, ReceiptStatus, SyncChannelLink, SyncChannelLinkId, SyncConnection, SyncConnectionId,
    SyncError, SyncOutcome, SyncResult, SyncSource,
};
use tracing::{debug, warn};

use crate::repos::{
    CommitReceipt, EventReceiptRepo, IntegrationConnectionRepo, MessageRepo,
    OrganizationMemberRepo, SyncChannelLinkRepo, SyncConnectionRepo, SyncMessageLinkRepo, UserRepo,
};
use crate::resolver::IdentityResolver;
use crate::IntegrationBotService;

/// Public verbs, all keyed on a `syncConnectionId` and performed under a
/// system actor context (spec §4.4). Constructed with the five repositories
/// and the identity/bot collaborators and the adapter registry as plain
/// dependencies — no global context beyond that (spec §9).
pub struct ChatSyncCoreWorker {
    pub(crate) connections: Arc<dyn SyncConnectionRepo>,
    pub(crate) channel_links: Arc<dyn SyncChannelLinkRepo>,
    pub(crate) message_links: Arc<dyn SyncMessageLinkRepo>,
    pub(crate) receipts: Arc<dyn EventReceiptRepo>,
    pub(crate) messages: Arc<dyn MessageRepo>,
    pub(crate) identity: Arc<IdentityResolver>,
    pub(crate) bot_service: Arc<dyn IntegrationBotService>,
    pub(crate) adapters: Arc<AdapterRegistry>,
}

impl ChatSyncCoreWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connections: Arc<dyn SyncConnectionRepo>,
        channel_links: Arc<dyn SyncChannelLinkRepo>,
        message_links: Arc<dyn SyncMessageLinkRepo>,
        receipts: Arc<dyn EventReceiptRepo>,
        messages: Arc<dyn MessageRepo>,
        integration_connections: Arc<dyn IntegrationConnectionRepo>,
        users: Arc<dyn UserRepo>,
        org_members: Arc<dyn OrganizationMemberRepo>,
        bot_service: Arc<dyn IntegrationBotService>,
        adapters: Arc<AdapterRegistry>,
    ) -> Self {
        let identity = Arc::new(IdentityResolver::new(integration_connections, users, org_members));
        Self {
            connections,
            channel_links,
            message_links,
            receipts,
            messages,
            identity,
            bot_service,
            adapters,
        }
    }

    /// Load the connection, verify its provider matches and it is active,
    /// and verify the adapter exists (spec §4.4.1 steps 2-3, shared by every
    /// verb). Returns `Ok(None)` when the caller should commit `ignored` and
    /// short-circuit rather than fail.
    pub(crate) async fn load_active_connection(
        &self,
        connection_id: SyncConnectionId,
        expected_provider: Provider,
    ) -> SyncResult<Result<SyncConnection, SyncOutcome>> {
        let connection = self
            .connections
            .find_by_id(connection_id)
            .await?
            .ok_or_else(|| SyncError::ConnectionNotFound(connection_id.to_string()))?;

        if connection.provider != expected_provider || !connection.is_active() {
            debug!(
                connection = %connection_id,
                provider = %connection.provider,
                status = ?connection.status,
                "connection inactive or provider mismatch"
            );
            return Ok(Err(SyncOutcome::IgnoredConnectionInactive));
        }

        // Registry lookup used purely as a provider-configuration gate
        // (spec §4.4.1 step 3); the adapter itself is fetched again by the
        // verb that actually needs it.
        self.adapters.get(connection.provider)?;

        Ok(Ok(connection))
    }

    /// All *active* channel links across every connection and org whose
    /// external channel matches (spec §4.7 step 3) — the cross-tenant
    /// lookup the gateway consumer uses to fan an inbound event out to
    /// every Hazel channel mirroring that external channel.
    pub async fn find_active_channel_links_by_external_channel(
        &self,
        external_channel_id: &chatsync_types::ExternalChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        self.channel_links
            .find_active_by_external_channel(external_channel_id)
            .await
    }

    /// The connection a channel link belongs to — used by the gateway
    /// consumer to know which provider/org an inbound event's target link
    /// is scoped to before invoking an ingress verb.
    pub async fn find_connection(&self, connection_id: SyncConnectionId) -> SyncResult<Option<SyncConnection>> {
        self.connections.find_by_id(connection_id).await
    }

    pub(crate) async fn heartbeat(&self, connection_id: SyncConnectionId, channel_link_id: SyncChannelLinkId) {
        if let Err(err) = self.connections.update_last_synced_at(connection_id).await {
            warn!(connection = %connection_id, %err, "failed to heartbeat connection");
        }
        if let Err(err) = self.channel_links.update_last_synced_at(channel_link_id).await {
            warn!(channel_link = %channel_link_id, %err, "failed to heartbeat channel link");
        }
    }

    pub(crate) async fn commit_ignored(
        &self,
        connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        channel_link_id: Option<SyncChannelLinkId>,
    ) -> SyncResult<()> {
        self.receipts
            .commit(CommitReceipt {
                sync_connection_id: connection_id,
                source,
                dedupe_key,
                status: ReceiptStatus::Ignored,
                payload_hash: None,
                error_message: None,
                channel_link_id,
            })
            .await
    }

    pub(crate) async fn commit_processed(
        &self,
        connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        payload_hash: Option<String>,
        channel_link_id: Option<SyncChannelLinkId>,
    ) -> SyncResult<()> {
        self.receipts
            .commit(CommitReceipt {
                sync_connection_id: connection_id,
                source,
                dedupe_key,
                status: ReceiptStatus::Processed,
                payload_hash,
                error_message: None,
                channel_link_id,
            })
            .await
    }

    /// Commit a receipt as `failed` — used for the `ChannelLinkNotFound`
    /// resolution of spec §9 Open Question 1 (see DESIGN.md).
    pub(crate) async fn commit_failed(
        &self,
        connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        error_message: &str,
    ) -> SyncResult<()> {
        self.receipts
            .commit(CommitReceipt {
                sync_connection_id: connection_id,
                source,
                dedupe_key,
                status: ReceiptStatus::Failed,
                payload_hash: None,
                error_message: Some(error_message.to_string()),
                channel_link_id: None,
            })
            .await
    }

    pub(crate) async fn find_channel_link_by_external(
        &self,
        connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        external_channel_id: &chatsync_types::ExternalChannelId,
    ) -> SyncResult<Result<SyncChannelLink, SyncError>> {
        match self
            .channel_links
            .find_by_external_channel(connection_id, external_channel_id)
            .await?
        {
            Some(link) => Ok(Ok(link)),
            None => {
                let err = SyncError::ChannelLinkNotFound {
                    connection: connection_id.to_string(),
                    external_channel_id: external_channel_id.to_string(),
                };
                // Open Question 1 (spec §9): commit `failed` rather than
                // leaving the receipt `claimed` forever.
                self.commit_failed(connection_id, source, dedupe_key, "channel link missing")
                    .await?;
                Ok(Err(err))
            }
        }
    }
}
