//! Identity types for the chat-sync engine
//!
//! Rows the engine owns outright get a UUID newtype so they can never be
//! mixed up with each other. Identifiers owned by other subsystems (Hazel
//! channels, messages, users, organizations) or by the external provider are
//! opaque strings — the engine never interprets their shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate UUID-backed ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Rows the sync engine owns exclusively (see spec §3 Ownership and lifetimes)
define_id_type!(SyncConnectionId, "syncconn", "Unique identifier for a sync connection");
define_id_type!(SyncChannelLinkId, "chanlink", "Unique identifier for a channel link");
define_id_type!(SyncMessageLinkId, "msglink", "Unique identifier for a message link");
define_id_type!(EventReceiptId, "receipt", "Unique identifier for an event receipt");

/// Macro to generate opaque string-backed ID types for identifiers owned by
/// other subsystems (Hazel's own tables, or the external provider).
macro_rules! define_string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_string_id!(HazelOrganizationId, "Internal organization identifier");
define_string_id!(HazelUserId, "Internal user identifier");
define_string_id!(HazelChannelId, "Internal channel identifier");
define_string_id!(HazelMessageId, "Internal message identifier");
define_string_id!(ExternalChannelId, "Provider channel identifier");
define_string_id!(ExternalMessageId, "Provider message identifier");
define_string_id!(ExternalUserId, "Provider user identifier");
define_string_id!(ExternalThreadId, "Provider thread identifier");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_connection_id_roundtrips_through_display() {
        let id = SyncConnectionId::new();
        let s = id.to_string();
        assert!(s.starts_with("syncconn_"));
        let parsed = SyncConnectionId::parse(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_accepts_bare_uuid_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed = EventReceiptId::parse(&uuid.to_string()).unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn string_ids_compare_by_value() {
        let a = HazelChannelId::new("chan-1");
        let b = HazelChannelId::new("chan-1");
        let c = HazelChannelId::new("chan-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
