//! Hazel Chat-Sync Core - the provider-agnostic sync engine (spec §2.4).
//!
//! This crate composes the receipt ledger, the identity resolver, and the
//! repository ports into the worker verbs every provider binding (e.g.
//! `chatsync-discord`) drives: ingress create/update/delete, outbound
//! send/update/delete, fan-out across connections, and connection-scoped
//! backfill.
//!
//! Nothing in this crate knows about Discord, PostgreSQL, or WebSockets —
//! it depends only on `chatsync-types` and `chatsync-provider`, and on
//! repository traits it defines itself (`repos`), so its own test suite can
//! run entirely against in-memory fakes (`testutil`, behind the
//! `test-fakes` feature).

pub mod backfill;
pub mod fanout;
pub mod hash;
pub mod ingress;
pub mod outbound;
pub mod repos;
pub mod resolver;
pub mod worker;

#[cfg(any(test, feature = "test-fakes"))]
pub mod testutil;

pub use backfill::{BackfillScanner, ConnectionBackfillSummary};
pub use fanout::{FanoutDispatcher, FanoutSummary};
pub use ingress::{IngestMessageCreate, IngestMessageMutation};
pub use repos::IntegrationBotService;
pub use resolver::IdentityResolver;
pub use worker::ChatSyncCoreWorker;
