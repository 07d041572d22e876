use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record_type::RecordType;

/// A deterministic, content-derived identifier. Always a lowercase hex
/// sha256 digest (64 chars), so two independent runs over identical
/// inputs produce byte-identical ids (§3 I2, §8 replay determinism).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// sha256 hex digest of arbitrary bytes. Used for `content_hash`,
/// `blob_id` (§4.1 `put_blob`), and thumbnail fingerprints (§4.2).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Derive a record id as `H(record_type, parent_refs, stable_ordinal)`.
///
/// `parent_refs` must already be in the caller's canonical order — this
/// function does not sort, since for types like `obs.uia.*` the parent
/// (the single `uia_ref`) combined with `stable_ordinal` (the section +
/// node index) is what makes the id deterministic, not set membership.
pub fn derive_record_id(record_type: RecordType, parent_refs: &[RecordId], stable_ordinal: &str) -> RecordId {
    let mut hasher = Sha256::new();
    hasher.update(record_type.as_str().as_bytes());
    hasher.update(b"\0");
    for parent in parent_refs {
        hasher.update(parent.as_str().as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"\0");
    hasher.update(stable_ordinal.as_bytes());
    RecordId(format!("{:x}", hasher.finalize()))
}

/// Canonical sha256 over a JSON payload. `serde_json::Value` objects
/// serialize with sorted keys (the `Map` backing is a `BTreeMap` unless
/// the `preserve_order` feature is enabled, which this workspace does not
/// pull in), so two structurally-identical payloads hash identically
/// regardless of field insertion order.
pub fn canonical_payload_hash(payload: &serde_json::Value) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(sha256_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_id() {
        let parents = vec![RecordId("abc".into())];
        let a = derive_record_id(RecordType::ObsUiaFocus, &parents, "focus:0");
        let b = derive_record_id(RecordType::ObsUiaFocus, &parents, "focus:0");
        assert_eq!(a, b);
    }

    #[test]
    fn different_ordinal_different_id() {
        let parents = vec![RecordId("abc".into())];
        let a = derive_record_id(RecordType::ObsUiaFocus, &parents, "focus:0");
        let b = derive_record_id(RecordType::ObsUiaFocus, &parents, "focus:1");
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_hash_ignores_insertion_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonical_payload_hash(&a).unwrap(), canonical_payload_hash(&b).unwrap());
    }
}
