//! In-memory repository and collaborator fakes backing this crate's own
//! test suite and its `tests/` integration tests (spec §2.4, §8).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use chatsync_types::{
    EventReceipt, EventReceiptId, ExternalChannelId, ExternalMessageId, HazelChannelId,
    HazelMessage, HazelMessageId, HazelOrganizationId, HazelUserId, NewHazelMessage,
    NewSyncMessageLink, Provider, ReceiptStatus, SyncChannelLink, SyncChannelLinkId,
    SyncConnection, SyncConnectionId, SyncMessageLink, SyncMessageLinkId, SyncResult, SyncSource,
};

use crate::repos::{
    CommitReceipt, EventReceiptRepo, IntegrationConnectionRepo, MessageRepo,
    OrganizationMemberRepo, ShadowUserUpsert, SyncChannelLinkRepo, SyncConnectionRepo,
    SyncMessageLinkRepo, UserRepo,
};
use crate::IntegrationBotService;

// ---------------------------------------------------------------------
// SyncConnectionRepo
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSyncConnectionRepo {
    rows: Mutex<HashMap<SyncConnectionId, SyncConnection>>,
}

impl FakeSyncConnectionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connection: SyncConnection) -> SyncConnectionId {
        let id = connection.id;
        self.rows.lock().insert(id, connection);
        id
    }

    pub fn last_synced_at(&self, id: SyncConnectionId) -> Option<chrono::DateTime<Utc>> {
        self.rows.lock().get(&id).and_then(|c| c.last_synced_at)
    }

    pub fn set_status(&self, id: SyncConnectionId, status: chatsync_types::ConnectionStatus) {
        if let Some(c) = self.rows.lock().get_mut(&id) {
            c.status = status;
        }
    }
}

#[async_trait]
impl SyncConnectionRepo for FakeSyncConnectionRepo {
    async fn find_by_id(&self, id: SyncConnectionId) -> SyncResult<Option<SyncConnection>> {
        Ok(self.rows.lock().get(&id).cloned())
    }

    async fn find_active_by_provider(&self, provider: Provider) -> SyncResult<Vec<SyncConnection>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|c| c.provider == provider && c.is_active())
            .cloned()
            .collect())
    }

    async fn update_last_synced_at(&self, id: SyncConnectionId) -> SyncResult<()> {
        if let Some(c) = self.rows.lock().get_mut(&id) {
            c.last_synced_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// SyncChannelLinkRepo
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSyncChannelLinkRepo {
    rows: Mutex<HashMap<SyncChannelLinkId, SyncChannelLink>>,
}

impl FakeSyncChannelLinkRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, link: SyncChannelLink) -> SyncChannelLinkId {
        let id = link.id;
        self.rows.lock().insert(id, link);
        id
    }

    pub fn last_synced_at(&self, id: SyncChannelLinkId) -> Option<chrono::DateTime<Utc>> {
        self.rows.lock().get(&id).and_then(|l| l.last_synced_at)
    }
}

#[async_trait]
impl SyncChannelLinkRepo for FakeSyncChannelLinkRepo {
    async fn find_by_hazel_channel(
        &self,
        connection: SyncConnectionId,
        hazel_channel_id: &HazelChannelId,
    ) -> SyncResult<Option<SyncChannelLink>> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|l| {
                l.sync_connection_id == connection
                    && &l.hazel_channel_id == hazel_channel_id
                    && l.deleted_at.is_none()
            })
            .cloned())
    }

    async fn find_by_external_channel(
        &self,
        connection: SyncConnectionId,
        external_channel_id: &ExternalChannelId,
    ) -> SyncResult<Option<SyncChannelLink>> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|l| {
                l.sync_connection_id == connection
                    && &l.external_channel_id == external_channel_id
                    && l.deleted_at.is_none()
            })
            .cloned())
    }

    async fn find_active_by_sync_connection(
        &self,
        connection: SyncConnectionId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|l| l.sync_connection_id == connection && l.is_live())
            .cloned()
            .collect())
    }

    async fn find_active_by_external_channel(
        &self,
        external_channel_id: &ExternalChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|l| &l.external_channel_id == external_channel_id && l.is_live())
            .cloned()
            .collect())
    }

    async fn find_active_by_hazel_channel(
        &self,
        hazel_channel_id: &HazelChannelId,
    ) -> SyncResult<Vec<SyncChannelLink>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|l| &l.hazel_channel_id == hazel_channel_id && l.is_live())
            .cloned()
            .collect())
    }

    async fn update_last_synced_at(&self, id: SyncChannelLinkId) -> SyncResult<()> {
        if let Some(l) = self.rows.lock().get_mut(&id) {
            l.last_synced_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// SyncMessageLinkRepo
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSyncMessageLinkRepo {
    rows: Mutex<Vec<SyncMessageLink>>,
}

impl FakeSyncMessageLinkRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<SyncMessageLink> {
        self.rows.lock().clone()
    }

    pub fn is_mirrored(&self, channel_link_id: SyncChannelLinkId, hazel_message_id: &HazelMessageId) -> bool {
        self.rows
            .lock()
            .iter()
            .any(|l| l.channel_link_id == channel_link_id && &l.hazel_message_id == hazel_message_id && l.is_live())
    }
}

#[async_trait]
impl SyncMessageLinkRepo for FakeSyncMessageLinkRepo {
    async fn find_by_hazel_message(
        &self,
        channel_link_id: SyncChannelLinkId,
        hazel_message_id: &HazelMessageId,
    ) -> SyncResult<Option<SyncMessageLink>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|l| {
                l.channel_link_id == channel_link_id
                    && &l.hazel_message_id == hazel_message_id
                    && l.is_live()
            })
            .cloned())
    }

    async fn find_by_external_message(
        &self,
        channel_link_id: SyncChannelLinkId,
        external_message_id: &ExternalMessageId,
    ) -> SyncResult<Option<SyncMessageLink>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|l| {
                l.channel_link_id == channel_link_id
                    && &l.external_message_id == external_message_id
                    && l.is_live()
            })
            .cloned())
    }

    async fn insert(&self, row: NewSyncMessageLink) -> SyncResult<SyncMessageLink> {
        let link = SyncMessageLink {
            id: SyncMessageLinkId::new(),
            channel_link_id: row.channel_link_id,
            hazel_message_id: row.hazel_message_id,
            external_message_id: row.external_message_id,
            source: row.source,
            hazel_thread_id: row.hazel_thread_id,
            external_thread_id: row.external_thread_id,
            root_hazel_message_id: row.root_hazel_message_id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.rows.lock().push(link.clone());
        Ok(link)
    }

    async fn update_last_synced_at(&self, _id: SyncMessageLinkId) -> SyncResult<()> {
        Ok(())
    }

    async fn soft_delete(&self, id: SyncMessageLinkId) -> SyncResult<()> {
        if let Some(l) = self.rows.lock().iter_mut().find(|l| l.id == id) {
            l.deleted_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// EventReceiptRepo
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeEventReceiptRepo {
    rows: Mutex<HashMap<(SyncConnectionId, &'static str, String), EventReceipt>>,
}

impl FakeEventReceiptRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, connection: SyncConnectionId, source: SyncSource, dedupe_key: &str) -> Option<EventReceipt> {
        self.rows
            .lock()
            .get(&(connection, source.tag(), dedupe_key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl EventReceiptRepo for FakeEventReceiptRepo {
    async fn claim(
        &self,
        sync_connection_id: SyncConnectionId,
        source: SyncSource,
        dedupe_key: &str,
        channel_link_id: Option<SyncChannelLinkId>,
    ) -> SyncResult<bool> {
        let key = (sync_connection_id, source.tag(), dedupe_key.to_string());
        let mut rows = self.rows.lock();
        if let Some(existing) = rows.get_mut(&key) {
            // A `failed` row is re-claimable (spec §9 Open Question 1);
            // anything else (`claimed`, `processed`, `ignored`) is a
            // duplicate the caller must short-circuit on.
            if existing.status != ReceiptStatus::Failed {
                return Ok(false);
            }
            existing.status = ReceiptStatus::Claimed;
            existing.error_message = None;
            existing.committed_at = None;
            existing.claimed_at = Utc::now();
            return Ok(true);
        }
        rows.insert(
            key,
            EventReceipt {
                id: EventReceiptId::new(),
                sync_connection_id,
                channel_link_id,
                source,
                dedupe_key: dedupe_key.to_string(),
                payload_hash: None,
                status: ReceiptStatus::Claimed,
                error_message: None,
                claimed_at: Utc::now(),
                committed_at: None,
            },
        );
        Ok(true)
    }

    async fn commit(&self, params: CommitReceipt<'_>) -> SyncResult<()> {
        let key = (
            params.sync_connection_id,
            params.source.tag(),
            params.dedupe_key.to_string(),
        );
        let mut rows = self.rows.lock();
        let entry = rows.entry(key.clone()).or_insert_with(|| EventReceipt {
            id: EventReceiptId::new(),
            sync_connection_id: params.sync_connection_id,
            channel_link_id: params.channel_link_id,
            source: params.source,
            dedupe_key: params.dedupe_key.to_string(),
            payload_hash: None,
            status: ReceiptStatus::Claimed,
            error_message: None,
            claimed_at: Utc::now(),
            committed_at: None,
        });
        entry.status = params.status;
        entry.payload_hash = params.payload_hash;
        entry.error_message = params.error_message;
        if params.channel_link_id.is_some() {
            entry.channel_link_id = params.channel_link_id;
        }
        entry.committed_at = Some(Utc::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------
// MessageRepo
// ---------------------------------------------------------------------

pub struct FakeMessageRepo {
    rows: Mutex<HashMap<HazelMessageId, HazelMessage>>,
    insertion_order: Mutex<Vec<HazelMessageId>>,
    counter: AtomicU64,
    message_links: Arc<FakeSyncMessageLinkRepo>,
}

impl FakeMessageRepo {
    pub fn new(message_links: Arc<FakeSyncMessageLinkRepo>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            insertion_order: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
            message_links,
        }
    }

    /// Seed a pre-existing message (as if it were created outside the
    /// engine) for backfill tests.
    pub fn seed(&self, channel_id: &HazelChannelId, author_id: &HazelUserId, content: &str) -> HazelMessageId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = HazelMessageId::new(format!("msg-{n}"));
        let msg = HazelMessage {
            id: id.clone(),
            channel_id: channel_id.clone(),
            author_id: author_id.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.rows.lock().insert(id.clone(), msg);
        self.insertion_order.lock().push(id.clone());
        id
    }

    pub fn get(&self, id: &HazelMessageId) -> Option<HazelMessage> {
        self.rows.lock().get(id).cloned()
    }
}

#[async_trait]
impl MessageRepo for FakeMessageRepo {
    async fn find_by_id(&self, id: &HazelMessageId) -> SyncResult<Option<HazelMessage>> {
        Ok(self.rows.lock().get(id).cloned())
    }

    async fn insert(&self, row: NewHazelMessage) -> SyncResult<HazelMessage> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = HazelMessageId::new(format!("msg-{n}"));
        let msg = HazelMessage {
            id: id.clone(),
            channel_id: row.channel_id,
            author_id: row.author_id,
            content: row.content,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.rows.lock().insert(id.clone(), msg.clone());
        self.insertion_order.lock().push(id);
        Ok(msg)
    }

    async fn update_content(&self, id: &HazelMessageId, content: &str) -> SyncResult<()> {
        if let Some(m) = self.rows.lock().get_mut(id) {
            m.content = content.to_string();
            m.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &HazelMessageId, deleted_at: chrono::DateTime<Utc>) -> SyncResult<()> {
        if let Some(m) = self.rows.lock().get_mut(id) {
            m.deleted_at = Some(deleted_at);
            m.updated_at = deleted_at;
        }
        Ok(())
    }

    async fn find_unmirrored_for_channel_link(
        &self,
        hazel_channel_id: &HazelChannelId,
        channel_link_id: SyncChannelLinkId,
        limit: i64,
    ) -> SyncResult<Vec<HazelMessage>> {
        let rows = self.rows.lock();
        let order = self.insertion_order.lock();
        let mut result: Vec<HazelMessage> = order
            .iter()
            .filter_map(|id| rows.get(id))
            .filter(|m| {
                &m.channel_id == hazel_channel_id
                    && m.deleted_at.is_none()
                    && !self.message_links.is_mirrored(channel_link_id, &m.id)
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        result.truncate(limit as usize);
        Ok(result)
    }
}

// ---------------------------------------------------------------------
// UserRepo / OrganizationMemberRepo / IntegrationConnectionRepo
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeUserRepo {
    by_external_id: Mutex<HashMap<String, HazelUserId>>,
    upserts: Mutex<Vec<ShadowUserUpsertRecord>>,
}

#[derive(Debug, Clone)]
pub struct ShadowUserUpsertRecord {
    pub synthetic_external_id: String,
    pub first_name: String,
    pub avatar_url: Option<String>,
    pub sync_avatar_url: bool,
}

impl FakeUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upserts(&self) -> Vec<ShadowUserUpsertRecord> {
        self.upserts.lock().clone()
    }

    pub fn sync_avatar_flags(&self) -> Vec<bool> {
        self.upserts.lock().iter().map(|u| u.sync_avatar_url).collect()
    }
}

#[async_trait]
impl UserRepo for FakeUserRepo {
    async fn upsert_by_external_id(
        &self,
        row: ShadowUserUpsert,
        sync_avatar_url: bool,
    ) -> SyncResult<HazelUserId> {
        let mut by_id = self.by_external_id.lock();
        let user_id = by_id
            .entry(row.synthetic_external_id.clone())
            .or_insert_with(|| HazelUserId::new(format!("shadow-{}", row.synthetic_external_id)))
            .clone();
        self.upserts.lock().push(ShadowUserUpsertRecord {
            synthetic_external_id: row.synthetic_external_id,
            first_name: row.first_name,
            avatar_url: row.avatar_url,
            sync_avatar_url,
        });
        Ok(user_id)
    }
}

#[derive(Default)]
pub struct FakeOrgMemberRepo {
    memberships: Mutex<Vec<(HazelOrganizationId, HazelUserId)>>,
}

impl FakeOrgMemberRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memberships(&self) -> Vec<(HazelOrganizationId, HazelUserId)> {
        self.memberships.lock().clone()
    }
}

#[async_trait]
impl OrganizationMemberRepo for FakeOrgMemberRepo {
    async fn upsert_by_org_and_user(
        &self,
        organization_id: &HazelOrganizationId,
        user_id: &HazelUserId,
    ) -> SyncResult<()> {
        let mut memberships = self.memberships.lock();
        let pair = (organization_id.clone(), user_id.clone());
        if !memberships.contains(&pair) {
            memberships.push(pair);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIntegrationConnectionRepo {
    mapping: Mutex<HashMap<(HazelOrganizationId, Provider, String), HazelUserId>>,
}

impl FakeIntegrationConnectionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(
        organization_id: HazelOrganizationId,
        provider: Provider,
        external_user_id: &str,
        user_id: HazelUserId,
    ) -> Self {
        let repo = Self::default();
        repo.mapping
            .lock()
            .insert((organization_id, provider, external_user_id.to_string()), user_id);
        repo
    }
}

#[async_trait]
impl IntegrationConnectionRepo for FakeIntegrationConnectionRepo {
    async fn find_active_user_by_external_account_id(
        &self,
        organization_id: &HazelOrganizationId,
        provider: Provider,
        external_user_id: &str,
    ) -> SyncResult<Option<HazelUserId>> {
        Ok(self
            .mapping
            .lock()
            .get(&(organization_id.clone(), provider, external_user_id.to_string()))
            .cloned())
    }
}

#[derive(Default)]
pub struct FakeBotService {
    bots: Mutex<HashMap<(Provider, HazelOrganizationId), HazelUserId>>,
}

impl FakeBotService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationBotService for FakeBotService {
    async fn get_or_create_bot_user(
        &self,
        provider: Provider,
        organization_id: &HazelOrganizationId,
    ) -> SyncResult<HazelUserId> {
        let mut bots = self.bots.lock();
        Ok(bots
            .entry((provider, organization_id.clone()))
            .or_insert_with(|| HazelUserId::new(format!("bot-{}-{}", provider.tag(), organization_id)))
            .clone())
    }
}

// ---------------------------------------------------------------------
// Adapter fake
// ---------------------------------------------------------------------

use chatsync_provider::{
    Adapter, CreateMessageRequest, CreateThreadRequest, DeleteMessageRequest, ReactionRequest,
    UpdateMessageRequest,
};
use chatsync_types::{ProviderError, ProviderResult};

#[derive(Default)]
pub struct FakeAdapter {
    counter: AtomicU64,
    pub created: Mutex<Vec<CreateMessageRequest>>,
    pub updated: Mutex<Vec<UpdateMessageRequest>>,
    pub deleted: Mutex<Vec<DeleteMessageRequest>>,
    pub fail_create: Mutex<bool>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock() = fail;
    }
}

#[async_trait]
impl Adapter for FakeAdapter {
    async fn create_message(&self, req: CreateMessageRequest) -> ProviderResult<ExternalMessageId> {
        if *self.fail_create.lock() {
            return Err(ProviderError::Api {
                provider: "discord".to_string(),
                message: "simulated failure".to_string(),
                status: Some(500),
                detail: None,
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = ExternalMessageId::new(format!("ext-msg-{n}"));
        self.created.lock().push(req);
        Ok(id)
    }

    async fn update_message(&self, req: UpdateMessageRequest) -> ProviderResult<()> {
        self.updated.lock().push(req);
        Ok(())
    }

    async fn delete_message(&self, req: DeleteMessageRequest) -> ProviderResult<()> {
        self.deleted.lock().push(req);
        Ok(())
    }

    async fn add_reaction(&self, _req: ReactionRequest) -> ProviderResult<()> {
        Ok(())
    }

    async fn remove_reaction(&self, _req: ReactionRequest) -> ProviderResult<()> {
        Ok(())
    }

    async fn create_thread(&self, _req: CreateThreadRequest) -> ProviderResult<String> {
        Ok("fake-thread".to_string())
    }
}
