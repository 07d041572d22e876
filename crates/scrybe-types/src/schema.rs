//! Per-`record_type` payload validation. Unknown types never reach here
//! (rejected earlier by [`crate::RecordType::parse`]); this module checks
//! that a known type's `attributes` carry the fields §3 requires.

use serde_json::Value;

use crate::error::ScrybeError;
use crate::record_type::RecordType;

fn require(obj: &Value, field: &str) -> Result<&Value, ScrybeError> {
    obj.get(field)
        .ok_or_else(|| ScrybeError::SchemaMismatch(format!("missing required field `{field}`")))
}

fn require_str(obj: &Value, field: &str) -> Result<(), ScrybeError> {
    require(obj, field)?
        .as_str()
        .ok_or_else(|| ScrybeError::SchemaMismatch(format!("field `{field}` must be a string")))?;
    Ok(())
}

fn require_u64(obj: &Value, field: &str) -> Result<(), ScrybeError> {
    require(obj, field)?
        .as_u64()
        .ok_or_else(|| ScrybeError::SchemaMismatch(format!("field `{field}` must be a non-negative integer")))?;
    Ok(())
}

/// Validate `attributes` against the closed schema for `record_type`.
/// Called by the store on every `put_new` (§4.1) so a malformed record
/// never becomes part of the evidence graph.
pub fn validate_payload(record_type: RecordType, attributes: &Value) -> Result<(), ScrybeError> {
    if !attributes.is_object() {
        return Err(ScrybeError::SchemaMismatch("attributes must be a JSON object".into()));
    }

    match record_type {
        RecordType::EvidenceCaptureFrame => {
            require_str(attributes, "image_sha256")?;
            require_u64(attributes, "width")?;
            require_u64(attributes, "height")?;
            require_str(attributes, "segment_id")?;
            require_u64(attributes, "frame_index")?;
            require_str(attributes, "thumb_sha256")?;
            require_str(attributes, "thumb_algo")?;
            Ok(())
        }
        RecordType::EvidenceUiaSnapshot => {
            require(attributes, "nodes")?
                .as_array()
                .ok_or_else(|| ScrybeError::SchemaMismatch("`nodes` must be an array".into()))?;
            Ok(())
        }
        RecordType::ObsUiaFocus | RecordType::ObsUiaContext | RecordType::ObsUiaOperable => {
            require_str(attributes, "uia_ref")?;
            require_u64(attributes, "node_index")?;
            Ok(())
        }
        RecordType::DerivedTextOcr | RecordType::DerivedTextVlm | RecordType::DerivedSstTextExtra => {
            require_str(attributes, "source_frame_id")?;
            require_str(attributes, "extractor_id")?;
            require_str(attributes, "model_version")?;
            require_str(attributes, "prompt_fingerprint")?;
            require(attributes, "quality")?;
            Ok(())
        }
        RecordType::DerivedIngestStage1Complete => {
            require_str(attributes, "frame_id")?;
            require_str(attributes, "reason")?;
            Ok(())
        }
        RecordType::DerivedIngestPluginCompletion => {
            require_str(attributes, "frame_id")?;
            require(attributes, "plugins")?
                .as_array()
                .ok_or_else(|| ScrybeError::SchemaMismatch("`plugins` must be an array".into()))?;
            Ok(())
        }
        RecordType::RetentionEligible => {
            require_str(attributes, "frame_id")?;
            require_str(attributes, "reason_code")?;
            require_u64(attributes, "horizon_hint_hours")?;
            Ok(())
        }
        RecordType::AuditMarkerEmit
        | RecordType::AuditKeyRotation
        | RecordType::AuditPolicyChange
        | RecordType::AuditCapabilityDenial
        | RecordType::AuditPluginHashMismatch
        | RecordType::AuditTermination
        | RecordType::AuditQuarantine => {
            require_str(attributes, "reason")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_payload_requires_all_fields() {
        let ok = serde_json::json!({
            "image_sha256": "ab", "width": 100, "height": 50,
            "segment_id": "seg-1", "frame_index": 0,
            "thumb_sha256": "cd", "thumb_algo": "64x64"
        });
        assert!(validate_payload(RecordType::EvidenceCaptureFrame, &ok).is_ok());

        let missing = serde_json::json!({"width": 100});
        assert!(validate_payload(RecordType::EvidenceCaptureFrame, &missing).is_err());
    }

    #[test]
    fn retention_eligible_requires_reason_code() {
        let bad = serde_json::json!({"frame_id": "x"});
        assert!(validate_payload(RecordType::RetentionEligible, &bad).is_err());
    }
}
