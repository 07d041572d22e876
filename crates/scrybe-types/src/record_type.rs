use serde::{Deserialize, Serialize};

use crate::error::ScrybeError;

/// Closed enumeration of record tags (§3 "Record types (closed set)").
///
/// Unknown types are rejected at write time — there is no escape hatch for
/// an ad-hoc tag, by design: a new kind of evidence means a new variant
/// here plus a schema validator in [`crate::schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    EvidenceCaptureFrame,
    EvidenceUiaSnapshot,
    ObsUiaFocus,
    ObsUiaContext,
    ObsUiaOperable,
    DerivedTextOcr,
    DerivedTextVlm,
    DerivedSstTextExtra,
    DerivedIngestStage1Complete,
    DerivedIngestPluginCompletion,
    RetentionEligible,
    AuditMarkerEmit,
    AuditKeyRotation,
    AuditPolicyChange,
    AuditCapabilityDenial,
    AuditPluginHashMismatch,
    AuditTermination,
    AuditQuarantine,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::EvidenceCaptureFrame => "evidence.capture.frame",
            RecordType::EvidenceUiaSnapshot => "evidence.uia.snapshot",
            RecordType::ObsUiaFocus => "obs.uia.focus",
            RecordType::ObsUiaContext => "obs.uia.context",
            RecordType::ObsUiaOperable => "obs.uia.operable",
            RecordType::DerivedTextOcr => "derived.text.ocr",
            RecordType::DerivedTextVlm => "derived.text.vlm",
            RecordType::DerivedSstTextExtra => "derived.sst.text.extra",
            RecordType::DerivedIngestStage1Complete => "derived.ingest.stage1.complete",
            RecordType::DerivedIngestPluginCompletion => "derived.ingest.plugin.completion",
            RecordType::RetentionEligible => "retention.eligible",
            RecordType::AuditMarkerEmit => "audit.marker_emit",
            RecordType::AuditKeyRotation => "audit.key_rotation",
            RecordType::AuditPolicyChange => "audit.policy_change",
            RecordType::AuditCapabilityDenial => "audit.capability_denial",
            RecordType::AuditPluginHashMismatch => "audit.plugin_hash_mismatch",
            RecordType::AuditTermination => "audit.termination",
            RecordType::AuditQuarantine => "audit.quarantine",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, ScrybeError> {
        Ok(match tag {
            "evidence.capture.frame" => RecordType::EvidenceCaptureFrame,
            "evidence.uia.snapshot" => RecordType::EvidenceUiaSnapshot,
            "obs.uia.focus" => RecordType::ObsUiaFocus,
            "obs.uia.context" => RecordType::ObsUiaContext,
            "obs.uia.operable" => RecordType::ObsUiaOperable,
            "derived.text.ocr" => RecordType::DerivedTextOcr,
            "derived.text.vlm" => RecordType::DerivedTextVlm,
            "derived.sst.text.extra" => RecordType::DerivedSstTextExtra,
            "derived.ingest.stage1.complete" => RecordType::DerivedIngestStage1Complete,
            "derived.ingest.plugin.completion" => RecordType::DerivedIngestPluginCompletion,
            "retention.eligible" => RecordType::RetentionEligible,
            "audit.marker_emit" => RecordType::AuditMarkerEmit,
            "audit.key_rotation" => RecordType::AuditKeyRotation,
            "audit.policy_change" => RecordType::AuditPolicyChange,
            "audit.capability_denial" => RecordType::AuditCapabilityDenial,
            "audit.plugin_hash_mismatch" => RecordType::AuditPluginHashMismatch,
            "audit.termination" => RecordType::AuditTermination,
            "audit.quarantine" => RecordType::AuditQuarantine,
            other => return Err(ScrybeError::SchemaMismatch(format!("unknown record_type: {other}"))),
        })
    }

    /// `true` for types that belong only to the ledger, never the
    /// queryable evidence store (§3 `audit.*`).
    pub fn is_ledger_only(self) -> bool {
        self.as_str().starts_with("audit.")
    }

    /// `true` for the three mandatory UIA projections emitted per §3 I3.
    pub fn is_uia_projection(self) -> bool {
        matches!(self, RecordType::ObsUiaFocus | RecordType::ObsUiaContext | RecordType::ObsUiaOperable)
    }

    pub fn uia_projections() -> [RecordType; 3] {
        [RecordType::ObsUiaFocus, RecordType::ObsUiaContext, RecordType::ObsUiaOperable]
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let all = [
            RecordType::EvidenceCaptureFrame,
            RecordType::EvidenceUiaSnapshot,
            RecordType::ObsUiaFocus,
            RecordType::ObsUiaContext,
            RecordType::ObsUiaOperable,
            RecordType::DerivedTextOcr,
            RecordType::DerivedTextVlm,
            RecordType::DerivedSstTextExtra,
            RecordType::DerivedIngestStage1Complete,
            RecordType::DerivedIngestPluginCompletion,
            RecordType::RetentionEligible,
            RecordType::AuditMarkerEmit,
            RecordType::AuditKeyRotation,
            RecordType::AuditPolicyChange,
            RecordType::AuditCapabilityDenial,
            RecordType::AuditPluginHashMismatch,
            RecordType::AuditTermination,
            RecordType::AuditQuarantine,
        ];
        for rt in all {
            assert_eq!(RecordType::parse(rt.as_str()).unwrap(), rt);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(RecordType::parse("evidence.capture.frame.v2").is_err());
    }

    #[test]
    fn ledger_only_flag_matches_audit_prefix() {
        assert!(RecordType::AuditQuarantine.is_ledger_only());
        assert!(!RecordType::EvidenceCaptureFrame.is_ledger_only());
    }
}
