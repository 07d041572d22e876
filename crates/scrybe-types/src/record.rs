use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::RecordId;
use crate::record_type::RecordType;

/// Identifies the code that produced a record: a plugin id plus its
/// version string, or `"core"` for records written directly by a core
/// component rather than a plugin (§3 Record base type `producer`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub plugin_id: String,
    pub version: String,
}

impl Producer {
    pub fn core() -> Self {
        Self { plugin_id: "core".to_string(), version: env!("CARGO_PKG_VERSION").to_string() }
    }

    pub fn plugin(plugin_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { plugin_id: plugin_id.into(), version: version.into() }
    }
}

/// Base record envelope shared by every record type (§3 "Record (base
/// type)"). `attributes` carries the type-specific payload; its shape is
/// checked against [`crate::schema::validate_payload`] before a record
/// is accepted by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub record_id: RecordId,
    pub record_type: RecordType,
    pub run_id: Uuid,
    /// UTC timestamp as integer microseconds since epoch. Canonical —
    /// never a float, never a human-formatted string, per §3.
    pub ts_utc: i64,
    /// Monotonic clock offset in nanoseconds, captured alongside `ts_utc`
    /// at the moment of creation. Durations derived from two records
    /// always use this field, never `ts_utc` deltas.
    pub monotonic_ns: u64,
    pub content_hash: String,
    pub producer: Producer,
    pub input_refs: Vec<RecordId>,
    pub schema_version: u32,
    pub attributes: serde_json::Value,
}

impl Record {
    /// Recompute `content_hash` from `attributes` and compare to the
    /// stored value. Used by the citation resolver (§4.7) and by
    /// `put_new`'s conflict check (§4.1 I1).
    pub fn attributes_hash_matches(&self) -> bool {
        crate::ids::canonical_payload_hash(&self.attributes)
            .map(|h| h == self.content_hash)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::canonical_payload_hash;

    fn sample() -> Record {
        let attrs = serde_json::json!({"width": 1920, "height": 1080});
        Record {
            record_id: RecordId("deadbeef".into()),
            record_type: RecordType::EvidenceCaptureFrame,
            run_id: Uuid::nil(),
            ts_utc: 1_700_000_000_000_000,
            monotonic_ns: 42,
            content_hash: canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![],
            schema_version: 1,
            attributes: attrs,
        }
    }

    #[test]
    fn hash_matches_for_untouched_record() {
        assert!(sample().attributes_hash_matches());
    }

    #[test]
    fn hash_mismatch_detected_after_tamper() {
        let mut r = sample();
        r.attributes = serde_json::json!({"width": 1921, "height": 1080});
        assert!(!r.attributes_hash_matches());
    }
}
