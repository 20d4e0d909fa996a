mod channel_link;
mod connection;
mod event_receipt;
mod identity;
mod message;
mod message_link;

pub use channel_link::PgSyncChannelLinkRepo;
pub use connection::PgSyncConnectionRepo;
pub use event_receipt::PgEventReceiptRepo;
pub use identity::{
    PgIntegrationBotService, PgIntegrationConnectionRepo, PgOrganizationMemberRepo, PgUserRepo,
};
pub use message::PgMessageRepo;
pub use message_link::PgSyncMessageLinkRepo;
