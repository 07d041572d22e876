//! Stage-1 Normalizer (C3, §4.3): turns a retained capture candidate
//! into the reap-safe record set, atomically, with retention emission
//! gated strictly by [`crate::completeness::is_reap_safe_complete`].
//!
//! Stage-1 MUST NOT import or invoke OCR/VLM/embedding code — this is
//! the one module in the workspace that is statically audited for that
//! at startup (see [`crate::dependency_audit`]).

use std::sync::atomic::{AtomicU64, Ordering};

use scrybe_capture::FrameCandidate;
use scrybe_store::EvidenceStore;
use scrybe_types::{derive_record_id, Producer, Record, RecordId, RecordType, ScrybeError};
use uuid::Uuid;

use crate::completeness::is_reap_safe_complete;
use crate::plugin_completion::PluginAttempt;
use crate::uia::{UiaInput, UiaSectionOutcome};

/// Outcome of normalizing one frame candidate.
#[derive(Debug, Clone)]
pub struct Stage1Outcome {
    pub frame_id: RecordId,
    pub stage1_complete_reason: String,
    pub retention_eligible: bool,
}

/// Mandatory per-frame normalizer. Holds no plugin logic of its own —
/// `uia` and `plugins` are supplied by whatever drives Stage-1 plugins
/// (outside this crate's scope, §1), this type only assembles and
/// commits the record set the contract requires.
pub struct Stage1Normalizer {
    store: std::sync::Arc<EvidenceStore>,
    run_id: Uuid,
    retention_horizon_hours: u64,
    ordinal: AtomicU64,
}

impl Stage1Normalizer {
    pub fn new(store: std::sync::Arc<EvidenceStore>, run_id: Uuid, retention_horizon_hours: u64) -> Self {
        Self { store, run_id, retention_horizon_hours, ordinal: AtomicU64::new(0) }
    }

    fn next_ordinal(&self) -> u64 {
        self.ordinal.fetch_add(1, Ordering::Relaxed)
    }

    /// Normalize one retained candidate (§4.3 steps). `ts_utc`/
    /// `monotonic_ns` are supplied by the caller so ordering matches the
    /// capture attempt's own clock reading rather than write time.
    pub async fn ingest_frame(
        &self,
        candidate: FrameCandidate,
        frame_index: u64,
        ts_utc: i64,
        monotonic_ns: u64,
        uia: UiaInput,
        plugins: Vec<PluginAttempt>,
    ) -> Result<Stage1Outcome, ScrybeError> {
        let image_sha256 = self.store.put_blob(&candidate.frame.bytes)?;

        let frame_attrs = serde_json::json!({
            "image_sha256": image_sha256,
            "width": candidate.frame.width,
            "height": candidate.frame.height,
            "segment_id": candidate.segment_id,
            "frame_index": frame_index,
            "thumb_sha256": candidate.thumb_sha256,
            "thumb_algo": candidate.thumb_algo,
        });
        let frame_content_hash = scrybe_types::canonical_payload_hash(&frame_attrs)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("hashing frame attributes: {e}")))?;
        let frame_id = derive_record_id(
            RecordType::EvidenceCaptureFrame,
            &[],
            &format!("{}:{frame_index}:{image_sha256}", candidate.segment_id),
        );
        let frame_record = Record {
            record_id: frame_id.clone(),
            record_type: RecordType::EvidenceCaptureFrame,
            run_id: self.run_id,
            ts_utc,
            monotonic_ns,
            content_hash: frame_content_hash,
            producer: Producer::core(),
            input_refs: vec![],
            schema_version: 1,
            attributes: frame_attrs,
        };

        let mut first_batch = vec![frame_record];
        if let Some(uia_ref) = &uia.uia_ref {
            for (section, outcome) in uia.sections() {
                if let Some(UiaSectionOutcome::Succeeded { attributes }) = outcome {
                    first_batch.push(build_uia_record(
                        self.run_id,
                        ts_utc,
                        monotonic_ns,
                        &frame_id,
                        uia_ref,
                        section,
                        attributes,
                    )?);
                }
            }
        }
        // §5: the Stage-1 batch of record writes is committed before the
        // completion marker is visible to any reader.
        self.store.put_batch(&first_batch)?;

        let completion_attrs = serde_json::json!({
            "frame_id": frame_id.as_str(),
            "plugins": plugins.iter().map(PluginAttempt::to_json).collect::<Vec<_>>(),
        });
        let completion_content_hash = scrybe_types::canonical_payload_hash(&completion_attrs)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("hashing completion attributes: {e}")))?;
        let completion_record = Record {
            record_id: derive_record_id(RecordType::DerivedIngestPluginCompletion, &[frame_id.clone()], "plugin-completion"),
            record_type: RecordType::DerivedIngestPluginCompletion,
            run_id: self.run_id,
            ts_utc,
            monotonic_ns,
            content_hash: completion_content_hash,
            producer: Producer::core(),
            input_refs: vec![frame_id.clone()],
            schema_version: 1,
            attributes: completion_attrs,
        };

        let completeness = is_reap_safe_complete(&uia, &plugins);
        let stage1_complete_reason = match &completeness {
            Ok(()) => "ok".to_string(),
            Err(reasons) => reasons.first().map(|r| r.code()).unwrap_or_else(|| "contract_incomplete".to_string()),
        };
        let stage1_attrs = serde_json::json!({
            "frame_id": frame_id.as_str(),
            "reason": stage1_complete_reason,
        });
        let stage1_content_hash = scrybe_types::canonical_payload_hash(&stage1_attrs)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("hashing stage1-complete attributes: {e}")))?;
        let stage1_record = Record {
            record_id: derive_record_id(RecordType::DerivedIngestStage1Complete, &[frame_id.clone()], "stage1-complete"),
            record_type: RecordType::DerivedIngestStage1Complete,
            run_id: self.run_id,
            ts_utc,
            monotonic_ns,
            content_hash: stage1_content_hash,
            producer: Producer::core(),
            input_refs: vec![frame_id.clone()],
            schema_version: 1,
            attributes: stage1_attrs,
        };

        let mut second_batch = vec![completion_record, stage1_record];
        let retention_eligible = completeness.is_ok();
        if retention_eligible {
            let retention_attrs = serde_json::json!({
                "frame_id": frame_id.as_str(),
                "reason_code": "ok",
                "horizon_hint_hours": self.retention_horizon_hours,
            });
            let retention_content_hash = scrybe_types::canonical_payload_hash(&retention_attrs)
                .map_err(|e| ScrybeError::SchemaMismatch(format!("hashing retention attributes: {e}")))?;
            second_batch.push(Record {
                record_id: derive_record_id(RecordType::RetentionEligible, &[frame_id.clone()], "retention"),
                record_type: RecordType::RetentionEligible,
                run_id: self.run_id,
                ts_utc,
                monotonic_ns,
                content_hash: retention_content_hash,
                producer: Producer::core(),
                input_refs: vec![frame_id.clone()],
                schema_version: 1,
                attributes: retention_attrs,
            });
        }
        // §5: completion marker and retention marker are written in the
        // same transactional batch.
        self.store.put_batch(&second_batch)?;

        if retention_eligible {
            let ordinal = self.next_ordinal().to_string();
            let marker =
                scrybe_audit::marker_emit(self.run_id, monotonic_ns, &ordinal, "retention.eligible", &frame_id);
            self.store.append_ledger(marker).await?;
        } else if let Err(reasons) = &completeness {
            let ordinal = self.next_ordinal().to_string();
            let reason = reasons.first().map(|r| r.code()).unwrap_or_else(|| "contract_incomplete".to_string());
            let quarantine = scrybe_audit::quarantine(self.run_id, monotonic_ns, &ordinal, &frame_id, &reason);
            self.store.append_ledger(quarantine).await?;
        }

        Ok(Stage1Outcome { frame_id, stage1_complete_reason, retention_eligible })
    }
}

fn build_uia_record(
    run_id: Uuid,
    ts_utc: i64,
    monotonic_ns: u64,
    frame_id: &RecordId,
    uia_ref: &str,
    section: &str,
    extra_attributes: &serde_json::Value,
) -> Result<Record, ScrybeError> {
    let record_type = match section {
        "focus" => RecordType::ObsUiaFocus,
        "context" => RecordType::ObsUiaContext,
        "operable" => RecordType::ObsUiaOperable,
        other => return Err(ScrybeError::SchemaMismatch(format!("unknown uia section: {other}"))),
    };
    let node_index = extra_attributes.get("node_index").and_then(|v| v.as_u64()).unwrap_or(0);
    let mut attrs = serde_json::json!({ "uia_ref": uia_ref, "node_index": node_index });
    if let (Some(obj), Some(extra_obj)) = (attrs.as_object_mut(), extra_attributes.as_object()) {
        for (k, v) in extra_obj {
            obj.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    let content_hash = scrybe_types::canonical_payload_hash(&attrs)
        .map_err(|e| ScrybeError::SchemaMismatch(format!("hashing uia attributes: {e}")))?;
    // §4.3: obs.uia.* ids derive from (uia_ref.record_id, section, node_index).
    let record_id = derive_record_id(record_type, &[], &format!("{uia_ref}:{section}:{node_index}"));
    Ok(Record {
        record_id,
        record_type,
        run_id,
        ts_utc,
        monotonic_ns,
        content_hash,
        producer: Producer::core(),
        input_refs: vec![frame_id.clone()],
        schema_version: 1,
        attributes: attrs,
    })
}
