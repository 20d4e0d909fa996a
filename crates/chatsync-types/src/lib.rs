//! Hazel Chat-Sync Types - canonical domain types for the chat-sync engine
//!
//! This crate contains the foundational types the sync engine reasons
//! about, with zero dependency on any other `chatsync-*` crate:
//!
//! - Identity types (`SyncConnectionId`, `SyncChannelLinkId`, ...) and the
//!   opaque string ids owned by Hazel and by external providers.
//! - The closed enums (`Provider`, `ConnectionStatus`, `SyncDirection`,
//!   `SyncSource`, `ReceiptStatus`) from the data model (spec §3).
//! - The row types for the four tables the engine owns or reads
//!   (`SyncConnection`, `SyncChannelLink`, `SyncMessageLink`,
//!   `EventReceipt`, `HazelMessage`).
//! - The tagged-result union (`SyncOutcome`) and the tagged-error taxonomy
//!   (`SyncError`, `ProviderError`).
//!
//! # Core invariant
//!
//! At most one side effect is ever produced per `(syncConnectionId, source,
//! dedupeKey)` triple. Everything else in this crate exists to make that
//! invariant expressible in the type system rather than convention.

pub mod enums;
pub mod error;
pub mod identity;
pub mod models;
pub mod outcome;

pub use enums::*;
pub use error::*;
pub use identity::*;
pub use models::*;
pub use outcome::*;
