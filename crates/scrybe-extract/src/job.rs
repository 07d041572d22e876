//! One unit of Stage-2 extraction work and its deterministic dedupe key
//! (§4.6 "derived records are keyed on `(frame_hash, extractor_version,
//! prompt_fingerprint, config_hash)`").

use scrybe_types::{derive_record_id, RecordId, RecordType};

/// Describes one extractor invocation against one Stage-1-complete
/// frame (§4.6 step 1-2).
#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub frame_id: RecordId,
    /// The frame's own `content_hash` — the "cheap-first reuse" key
    /// compares against this, not the raw image bytes (§4.6).
    pub frame_content_hash: String,
    pub extractor_id: String,
    pub extractor_version: String,
    pub model_version: String,
    pub prompt_fingerprint: String,
    pub config_hash: String,
    /// Capability string the plugin must have declared, e.g.
    /// `records.write(derived.text.ocr)` (§4.4).
    pub capability: String,
    pub record_type: RecordType,
}

impl ExtractJob {
    /// The deterministic ordinal a derived record for this job's output
    /// would be stored under — same inputs always resolve to the same
    /// `record_id`, which is what makes "reuse the prior derived record"
    /// (§4.6) safe: a reused record and a freshly-computed one for
    /// identical inputs are byte-identical by construction.
    pub fn derived_record_id(&self) -> RecordId {
        let ordinal = format!(
            "{}:{}:{}:{}",
            self.frame_content_hash, self.extractor_version, self.prompt_fingerprint, self.config_hash
        );
        derive_record_id(self.record_type, &[self.frame_id.clone()], &ordinal)
    }
}
