//! Row types for the four tables the sync engine owns or reads (spec §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ConnectionStatus, Provider, ReceiptStatus, SyncDirection, SyncSource};
use crate::identity::{
    EventReceiptId, ExternalChannelId, ExternalMessageId, ExternalThreadId, HazelChannelId,
    HazelMessageId, HazelOrganizationId, HazelUserId, SyncChannelLinkId, SyncConnectionId,
    SyncMessageLinkId,
};

/// An organization <-> external-workspace binding under a provider tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConnection {
    pub id: SyncConnectionId,
    pub organization_id: HazelOrganizationId,
    pub provider: Provider,
    pub external_workspace_id: String,
    pub status: ConnectionStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_by: HazelUserId,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SyncConnection {
    pub fn is_active(&self) -> bool {
        self.status.is_active() && self.deleted_at.is_none()
    }
}

/// A bound pair of `(hazel channel, external channel)` with a direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncChannelLink {
    pub id: SyncChannelLinkId,
    pub sync_connection_id: SyncConnectionId,
    pub hazel_channel_id: HazelChannelId,
    pub external_channel_id: ExternalChannelId,
    pub direction: SyncDirection,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SyncChannelLink {
    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// A bound pair of `(hazel message, external message)` scoped to a channel
/// link, recording which side originated the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMessageLink {
    pub id: SyncMessageLinkId,
    pub channel_link_id: SyncChannelLinkId,
    pub hazel_message_id: HazelMessageId,
    pub external_message_id: ExternalMessageId,
    pub source: SyncSource,
    pub hazel_thread_id: Option<HazelMessageId>,
    pub external_thread_id: Option<ExternalThreadId>,
    pub root_hazel_message_id: Option<HazelMessageId>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SyncMessageLink {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Fields needed to insert a new `SyncMessageLink` row.
#[derive(Debug, Clone)]
pub struct NewSyncMessageLink {
    pub channel_link_id: SyncChannelLinkId,
    pub hazel_message_id: HazelMessageId,
    pub external_message_id: ExternalMessageId,
    pub source: SyncSource,
    pub hazel_thread_id: Option<HazelMessageId>,
    pub external_thread_id: Option<ExternalThreadId>,
    pub root_hazel_message_id: Option<HazelMessageId>,
}

/// A ledger row uniquely keyed by `(connection, source, dedupeKey)` used to
/// guarantee at-most-one-effect (spec §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReceipt {
    pub id: EventReceiptId,
    pub sync_connection_id: SyncConnectionId,
    pub channel_link_id: Option<SyncChannelLinkId>,
    pub source: SyncSource,
    pub dedupe_key: String,
    pub payload_hash: Option<String>,
    pub status: ReceiptStatus,
    pub error_message: Option<String>,
    pub claimed_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
}

/// An internal Hazel message, as read and written by the sync engine.
///
/// The engine treats most of Hazel's message schema as opaque; this is the
/// subset the core verbs actually touch (spec §4.4.1-§4.4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazelMessage {
    pub id: HazelMessageId,
    pub channel_id: HazelChannelId,
    pub author_id: HazelUserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields needed to insert a new `HazelMessage` row on ingress (spec §4.4.1
/// step 7: "null reply/thread/embeds").
#[derive(Debug, Clone)]
pub struct NewHazelMessage {
    pub channel_id: HazelChannelId,
    pub author_id: HazelUserId,
    pub content: String,
}
