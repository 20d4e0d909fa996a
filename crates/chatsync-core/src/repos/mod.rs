//! Repository ports consumed by the sync core worker (spec §6).
//!
//! Every trait here is implemented against PostgreSQL by `chatsync-db`;
//! `chatsync-core`'s own tests implement them against in-memory fakes.

pub mod channel_link;
pub mod connection;
pub mod event_receipt;
pub mod identity;
pub mod message;
pub mod message_link;

pub use channel_link::*;
pub use connection::*;
pub use event_receipt::*;
pub use identity::*;
pub use message::*;
pub use message_link::*;
