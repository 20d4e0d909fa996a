//! Tagged domain failures for the sync engine (spec §7).
//!
//! These are surfaced to callers with full context; they are distinct from
//! `SyncOutcome`'s benign statuses, which are never errors.

use thiserror::Error;

/// Errors a provider adapter call can fail with (spec §4.1).
///
/// Every adapter operation fails with exactly one of these two variants —
/// never a raw transport error escaping the adapter boundary.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("provider not supported: {0}")]
    NotSupported(String),

    #[error("provider configuration error: {0}")]
    Configuration(String),

    #[error("provider API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
        status: Option<u16>,
        detail: Option<String>,
    },
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Tagged domain failures raised by `chatsync-core` verbs (spec §7).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("channel link not found for connection {connection}, external channel {external_channel_id}")]
    ChannelLinkNotFound {
        connection: String,
        external_channel_id: String,
    },

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Any other database error is fatal and propagates (spec §4.2, §7).
    /// `chatsync-db`'s own `DbError` (which depends on `sqlx`) converts into
    /// this variant at the crate boundary so this crate stays dependency-free
    /// of the storage layer, mirroring `openibank-core`'s separation from
    /// `openibank-db`.
    #[error("database error: {0}")]
    Database(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
