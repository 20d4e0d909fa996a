//! Database row models — mapped from the four `chat_sync_*` tables (spec §6)
//! and converted into the domain types `chatsync-core` consumes.
//!
//! Enums are persisted as `TEXT` columns (the provider tag, status tag,
//! etc.) rather than native Postgres enums, so that adding a provider or a
//! status never requires an `ALTER TYPE` migration — mirrored on
//! `openibank_db`'s `DbUser::status: String` columns.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use chatsync_types::{
    ConnectionStatus, EventReceipt, EventReceiptId, ExternalChannelId, ExternalMessageId,
    ExternalThreadId, HazelChannelId, HazelMessage, HazelMessageId, HazelOrganizationId,
    HazelUserId, Provider, ReceiptStatus, SyncChannelLink, SyncChannelLinkId, SyncConnection,
    SyncConnectionId, SyncDirection, SyncMessageLink, SyncMessageLinkId, SyncSource,
};

#[derive(Debug, Clone, FromRow)]
pub struct DbSyncConnection {
    pub id: Uuid,
    pub organization_id: String,
    pub provider: String,
    pub external_workspace_id: String,
    pub status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbSyncConnection> for SyncConnection {
    fn from(row: DbSyncConnection) -> Self {
        SyncConnection {
            id: SyncConnectionId::from_uuid(row.id),
            organization_id: HazelOrganizationId::new(row.organization_id),
            provider: Provider::parse(&row.provider).unwrap_or(Provider::Discord),
            external_workspace_id: row.external_workspace_id,
            status: parse_status(&row.status),
            last_synced_at: row.last_synced_at,
            created_by: HazelUserId::new(row.created_by),
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

fn parse_status(s: &str) -> ConnectionStatus {
    match s {
        "active" => ConnectionStatus::Active,
        "error" => ConnectionStatus::Error,
        _ => ConnectionStatus::Inactive,
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSyncChannelLink {
    pub id: Uuid,
    pub sync_connection_id: Uuid,
    pub hazel_channel_id: String,
    pub external_channel_id: String,
    pub direction: String,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbSyncChannelLink> for SyncChannelLink {
    fn from(row: DbSyncChannelLink) -> Self {
        SyncChannelLink {
            id: SyncChannelLinkId::from_uuid(row.id),
            sync_connection_id: SyncConnectionId::from_uuid(row.sync_connection_id),
            hazel_channel_id: HazelChannelId::new(row.hazel_channel_id),
            external_channel_id: ExternalChannelId::new(row.external_channel_id),
            direction: parse_direction(&row.direction),
            is_active: row.is_active,
            last_synced_at: row.last_synced_at,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

fn parse_direction(s: &str) -> SyncDirection {
    match s {
        "hazel_to_external" => SyncDirection::HazelToExternal,
        "external_to_hazel" => SyncDirection::ExternalToHazel,
        _ => SyncDirection::Both,
    }
}

pub fn direction_tag(direction: SyncDirection) -> &'static str {
    match direction {
        SyncDirection::Both => "both",
        SyncDirection::HazelToExternal => "hazel_to_external",
        SyncDirection::ExternalToHazel => "external_to_hazel",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSyncMessageLink {
    pub id: Uuid,
    pub channel_link_id: Uuid,
    pub hazel_message_id: String,
    pub external_message_id: String,
    pub source: String,
    pub hazel_thread_id: Option<String>,
    pub external_thread_id: Option<String>,
    pub root_hazel_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbSyncMessageLink> for SyncMessageLink {
    fn from(row: DbSyncMessageLink) -> Self {
        SyncMessageLink {
            id: SyncMessageLinkId::from_uuid(row.id),
            channel_link_id: SyncChannelLinkId::from_uuid(row.channel_link_id),
            hazel_message_id: HazelMessageId::new(row.hazel_message_id),
            external_message_id: ExternalMessageId::new(row.external_message_id),
            source: parse_source(&row.source),
            hazel_thread_id: row.hazel_thread_id.map(HazelMessageId::new),
            external_thread_id: row.external_thread_id.map(ExternalThreadId::new),
            root_hazel_message_id: row.root_hazel_message_id.map(HazelMessageId::new),
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

fn parse_source(s: &str) -> SyncSource {
    match s {
        "hazel" => SyncSource::Hazel,
        _ => SyncSource::External,
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbEventReceipt {
    pub id: Uuid,
    pub sync_connection_id: Uuid,
    pub channel_link_id: Option<Uuid>,
    pub source: String,
    pub dedupe_key: String,
    pub payload_hash: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub claimed_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
}

impl From<DbEventReceipt> for EventReceipt {
    fn from(row: DbEventReceipt) -> Self {
        EventReceipt {
            id: EventReceiptId::from_uuid(row.id),
            sync_connection_id: SyncConnectionId::from_uuid(row.sync_connection_id),
            channel_link_id: row.channel_link_id.map(SyncChannelLinkId::from_uuid),
            source: parse_source(&row.source),
            dedupe_key: row.dedupe_key,
            payload_hash: row.payload_hash,
            status: parse_receipt_status(&row.status),
            error_message: row.error_message,
            claimed_at: row.claimed_at,
            committed_at: row.committed_at,
        }
    }
}

fn parse_receipt_status(s: &str) -> ReceiptStatus {
    match s {
        "processed" => ReceiptStatus::Processed,
        "ignored" => ReceiptStatus::Ignored,
        "failed" => ReceiptStatus::Failed,
        _ => ReceiptStatus::Claimed,
    }
}

pub fn receipt_status_tag(status: ReceiptStatus) -> &'static str {
    match status {
        ReceiptStatus::Claimed => "claimed",
        ReceiptStatus::Processed => "processed",
        ReceiptStatus::Ignored => "ignored",
        ReceiptStatus::Failed => "failed",
    }
}

/// The subset of Hazel's `messages` table the sync engine reads and writes
/// (spec §3 "Ownership and lifetimes": the engine reads/writes Hazel
/// messages through a repository that validates authorship and
/// permissions — modeled here as a plain table this crate also owns, since
/// Hazel's own message schema lives outside this repository).
#[derive(Debug, Clone, FromRow)]
pub struct DbHazelMessage {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbHazelMessage> for HazelMessage {
    fn from(row: DbHazelMessage) -> Self {
        HazelMessage {
            id: HazelMessageId::new(row.id),
            channel_id: HazelChannelId::new(row.channel_id),
            author_id: HazelUserId::new(row.author_id),
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}
