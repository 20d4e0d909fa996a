//! Canonical payload hashing for the receipt ledger (spec §4.2).
//!
//! The hash is observational, not load-bearing for correctness — the unique
//! constraint on `(syncConnectionId, source, dedupeKey)` is what provides
//! at-most-one-effect. Any stable serialization is acceptable.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex SHA-256 over a JSON-serialized payload.
pub fn payload_hash<T: Serialize>(payload: &T) -> Option<String> {
    serde_json::to_vec(payload).ok().map(|bytes| {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Payload {
        a: u32,
        b: String,
    }

    #[test]
    fn hash_is_deterministic_for_same_payload() {
        let p1 = Payload { a: 1, b: "x".into() };
        let p2 = Payload { a: 1, b: "x".into() };
        assert_eq!(payload_hash(&p1), payload_hash(&p2));
        assert_eq!(payload_hash(&p1).unwrap().len(), 64);
    }

    #[test]
    fn hash_differs_for_different_payloads() {
        let p1 = Payload { a: 1, b: "x".into() };
        let p2 = Payload { a: 2, b: "x".into() };
        assert_ne!(payload_hash(&p1), payload_hash(&p2));
    }
}
