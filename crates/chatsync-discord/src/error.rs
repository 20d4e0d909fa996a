//! Gateway-session-local errors, mirrored on `resonancex_ws::WsError`.
//!
//! These never cross into `chatsync_types::SyncError` — a socket error
//! terminates only the current gateway session (spec §4.7, §7); the outer
//! reconnect loop is the only thing that observes it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to decode gateway envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("gateway closed with fatal code {0}")]
    FatalClose(u16),

    #[error("gateway session never received Hello")]
    NoHello,

    #[error("DISCORD_BOT_TOKEN is not set")]
    MissingToken,
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
