//! Deterministic identifiers for checklist documents.
//!
//! Checklist, STIG, and rule UUIDs are derived from a hash of the fields that
//! identify them, so converting the same inputs twice yields byte-identical
//! output.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// UUID of the checklist document for one host and benchmark.
pub fn checklist_uuid(hostname: &str, benchmark_id: &str) -> Uuid {
    stable_uuid(&format!("CKLB:{hostname}:{benchmark_id}"))
}

/// UUID of the STIG section inside a checklist.
pub fn stig_uuid(hostname: &str, benchmark_id: &str) -> Uuid {
    stable_uuid(&format!("STIG:{hostname}:{benchmark_id}"))
}

/// UUID of one checklist item.
///
/// Includes the item position because a scan may repeat a rule identifier.
pub fn rule_uuid(hostname: &str, benchmark_id: &str, rule_id: &str, position: usize) -> Uuid {
    stable_uuid(&format!("RULE:{hostname}:{benchmark_id}:{rule_id}:{position}"))
}

/// SHA-256 of a written document, hex-encoded.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First 16 bytes of the SHA-256 digest, shaped as a UUID.
fn stable_uuid(input: &str) -> Uuid {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_uuid() {
        assert_eq!(checklist_uuid("r1", "STIG"), checklist_uuid("r1", "STIG"));
        assert_eq!(rule_uuid("r1", "STIG", "SV-1", 0), rule_uuid("r1", "STIG", "SV-1", 0));
    }

    #[test]
    fn different_host_different_uuid() {
        assert_ne!(checklist_uuid("r1", "STIG"), checklist_uuid("r2", "STIG"));
    }

    #[test]
    fn repeated_rule_gets_distinct_uuid() {
        assert_ne!(rule_uuid("r1", "STIG", "SV-1", 0), rule_uuid("r1", "STIG", "SV-1", 1));
    }

    #[test]
    fn cross_kind_no_collision() {
        assert_ne!(checklist_uuid("r1", "STIG"), stig_uuid("r1", "STIG"));
    }

    #[test]
    fn digest_is_hex_sha256() {
        let digest = content_digest(b"checklist");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
