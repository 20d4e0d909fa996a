//! The tagged-result union every sync-core verb returns (spec §7, §9).
//!
//! Benign short-circuits (`deduped`, `already_linked`, `ignored_*`) are not
//! exceptions and must never be logged as errors — they are represented as
//! `SyncOutcome` values, entirely separate from `SyncError`. A verb's return
//! type is always `Result<SyncOutcome, SyncError>`.

use serde::{Deserialize, Serialize};

use crate::identity::{ExternalMessageId, HazelMessageId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// `claim` returned `false`: a receipt already exists for this dedupe
    /// key. No side effect was performed.
    Deduped,
    /// A live `SyncMessageLink` already exists for this external/hazel
    /// message pair, under a different dedupe key. The receipt was
    /// committed `ignored`.
    AlreadyLinked,
    /// No live `SyncMessageLink` exists for an update/delete verb. The
    /// receipt was committed `ignored`.
    IgnoredMissingLink,
    /// The connection is not `active` (or has the wrong provider). The
    /// receipt was committed `ignored`.
    IgnoredConnectionInactive,
    /// Ingress create succeeded.
    Created { hazel_message_id: HazelMessageId },
    /// Ingress update or delete succeeded.
    Updated,
    Deleted,
    /// Outbound create succeeded.
    Synced { external_message_id: ExternalMessageId },
}

impl SyncOutcome {
    /// Whether this outcome represents a benign short-circuit rather than a
    /// completed mirror operation — used by the fan-out dispatcher and
    /// backfill scanner to classify `{synced, skipped, failed}` (spec
    /// §4.4.6).
    pub fn is_benign_skip(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Deduped
                | SyncOutcome::AlreadyLinked
                | SyncOutcome::IgnoredMissingLink
                | SyncOutcome::IgnoredConnectionInactive
        )
    }
}
