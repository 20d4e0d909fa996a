//! Small closed enums shared across the sync connection, channel link,
//! message link, and event receipt rows (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The external chat provider a sync connection is bound to.
///
/// The reference implementation only ships a Discord binding, but the
/// registry (`chatsync-provider`) dispatches on the tag rather than the
/// enum variant count, so a deployment can register additional providers
/// without this type needing to grow in lock-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Discord,
}

impl Provider {
    /// The stable string tag used as the discriminant in dedupe keys, the
    /// adapter registry, and the `provider` column.
    pub fn tag(&self) -> &'static str {
        match self {
            Provider::Discord => "discord",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "discord" => Some(Provider::Discord),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Lifecycle status of a `SyncConnection` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    Inactive,
    Error,
}

impl ConnectionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionStatus::Active)
    }
}

/// Permitted direction of mirroring for a `SyncChannelLink` (spec §3).
///
/// A link with `ExternalToHazel` is ineligible as an outbound target; a link
/// with `HazelToExternal` is ineligible for ingress writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Both,
    HazelToExternal,
    ExternalToHazel,
}

impl SyncDirection {
    /// Ingress (external -> Hazel) writes are allowed on this link.
    pub fn allows_ingress(&self) -> bool {
        !matches!(self, SyncDirection::HazelToExternal)
    }

    /// Outbound (Hazel -> external) sends are allowed on this link.
    pub fn allows_outbound(&self) -> bool {
        !matches!(self, SyncDirection::ExternalToHazel)
    }
}

/// Which side originated a `SyncMessageLink` pair (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    Hazel,
    External,
}

impl SyncSource {
    pub fn tag(&self) -> &'static str {
        match self {
            SyncSource::Hazel => "hazel",
            SyncSource::External => "external",
        }
    }
}

impl fmt::Display for SyncSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Terminal (and pre-terminal `Claimed`) status of an `EventReceipt` row
/// (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Claimed,
    Processed,
    Ignored,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tag_roundtrips() {
        assert_eq!(Provider::parse("discord"), Some(Provider::Discord));
        assert_eq!(Provider::Discord.tag(), "discord");
        assert_eq!(Provider::parse("slack"), None);
    }

    #[test]
    fn direction_eligibility_matches_spec() {
        assert!(!SyncDirection::ExternalToHazel.allows_outbound());
        assert!(SyncDirection::ExternalToHazel.allows_ingress());
        assert!(!SyncDirection::HazelToExternal.allows_ingress());
        assert!(SyncDirection::HazelToExternal.allows_outbound());
        assert!(SyncDirection::Both.allows_ingress());
        assert!(SyncDirection::Both.allows_outbound());
    }
}
