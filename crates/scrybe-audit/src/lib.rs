//! Typed constructors for `audit.*` records (§3 "every privileged action
//! ... is an append-only ledger entry"). This crate owns no storage — it
//! only builds well-formed [`Record`]s; `scrybe-store::Ledger` is the
//! thing that actually appends them with hash-chaining.

use chrono::Utc;
use scrybe_types::{derive_record_id, Producer, Record, RecordId, RecordType};
use uuid::Uuid;

fn build(
    record_type: RecordType,
    run_id: Uuid,
    monotonic_ns: u64,
    ordinal: &str,
    reason: impl Into<String>,
    extra: serde_json::Value,
) -> Record {
    let mut attributes = serde_json::json!({ "reason": reason.into() });
    if let (Some(obj), Some(extra_obj)) = (attributes.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    let content_hash = scrybe_types::canonical_payload_hash(&attributes)
        .expect("audit attributes are always serializable");
    let record_id = derive_record_id(record_type, &[], &format!("{run_id}:{ordinal}"));
    Record {
        record_id,
        record_type,
        run_id,
        ts_utc: Utc::now().timestamp_micros(),
        monotonic_ns,
        content_hash,
        producer: Producer::core(),
        input_refs: vec![],
        schema_version: 1,
        attributes,
    }
}

/// `retention.eligible` / `derived.ingest.stage1.complete` marker emission.
pub fn marker_emit(run_id: Uuid, monotonic_ns: u64, ordinal: &str, marker_kind: &str, frame_id: &RecordId) -> Record {
    build(
        RecordType::AuditMarkerEmit,
        run_id,
        monotonic_ns,
        ordinal,
        format!("emitted {marker_kind} for frame {frame_id}"),
        serde_json::json!({ "marker_kind": marker_kind, "frame_id": frame_id.as_str() }),
    )
}

pub fn key_rotation(run_id: Uuid, monotonic_ns: u64, ordinal: &str, key_id: &str) -> Record {
    build(
        RecordType::AuditKeyRotation,
        run_id,
        monotonic_ns,
        ordinal,
        format!("rotated key {key_id}"),
        serde_json::json!({ "key_id": key_id }),
    )
}

pub fn policy_change(run_id: Uuid, monotonic_ns: u64, ordinal: &str, field: &str, old: &str, new: &str) -> Record {
    build(
        RecordType::AuditPolicyChange,
        run_id,
        monotonic_ns,
        ordinal,
        format!("policy `{field}` changed"),
        serde_json::json!({ "field": field, "old": old, "new": new }),
    )
}

pub fn capability_denial(run_id: Uuid, monotonic_ns: u64, ordinal: &str, plugin_id: &str, capability: &str) -> Record {
    build(
        RecordType::AuditCapabilityDenial,
        run_id,
        monotonic_ns,
        ordinal,
        format!("plugin {plugin_id} denied capability {capability}"),
        serde_json::json!({ "plugin_id": plugin_id, "capability": capability }),
    )
}

pub fn plugin_hash_mismatch(run_id: Uuid, monotonic_ns: u64, ordinal: &str, plugin_id: &str, expected: &str, actual: &str) -> Record {
    build(
        RecordType::AuditPluginHashMismatch,
        run_id,
        monotonic_ns,
        ordinal,
        format!("plugin {plugin_id} hash mismatch"),
        serde_json::json!({ "plugin_id": plugin_id, "expected_sha256": expected, "actual_sha256": actual }),
    )
}

pub fn termination(run_id: Uuid, monotonic_ns: u64, ordinal: &str, subject: &str, reason: &str) -> Record {
    build(
        RecordType::AuditTermination,
        run_id,
        monotonic_ns,
        ordinal,
        format!("{subject} terminated: {reason}"),
        serde_json::json!({ "subject": subject }),
    )
}

pub fn quarantine(run_id: Uuid, monotonic_ns: u64, ordinal: &str, frame_id: &RecordId, reason: &str) -> Record {
    build(
        RecordType::AuditQuarantine,
        run_id,
        monotonic_ns,
        ordinal,
        reason.to_string(),
        serde_json::json!({ "frame_id": frame_id.as_str() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_denial_carries_plugin_and_capability() {
        let run_id = Uuid::nil();
        let rec = capability_denial(run_id, 0, "1", "evil-plugin", "media.read");
        assert_eq!(rec.record_type, RecordType::AuditCapabilityDenial);
        assert_eq!(rec.attributes["plugin_id"], "evil-plugin");
        assert_eq!(rec.attributes["capability"], "media.read");
        assert!(rec.attributes_hash_matches());
    }

    #[test]
    fn distinct_ordinals_produce_distinct_ids() {
        let run_id = Uuid::nil();
        let a = termination(run_id, 0, "1", "stage2-job", "preempted");
        let b = termination(run_id, 0, "2", "stage2-job", "preempted");
        assert_ne!(a.record_id, b.record_id);
    }
}
