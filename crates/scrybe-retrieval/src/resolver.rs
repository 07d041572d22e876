//! Citation resolver (§4.7 "Citation resolver"). Verifies a citation
//! against the live store before C8 is allowed to treat it as valid
//! evidence for an `OK` answer.

use scrybe_store::EvidenceStore;
use scrybe_types::{Record, RecordId, RecordType, ScrybeError};

use crate::types::{Candidate, Citation, CitationFault, SpanId, SpanOffsets};

pub struct CitationResolver<'a> {
    store: &'a EvidenceStore,
}

impl<'a> CitationResolver<'a> {
    pub fn new(store: &'a EvidenceStore) -> Self {
        Self { store }
    }

    /// Convenience wrapper for C8: build the citation a retrieval
    /// candidate implies and resolve it in one call.
    pub fn resolve_candidate(&self, candidate: &Candidate) -> Result<Record, CitationFault> {
        let citation = Citation {
            record_id: candidate.record_id.clone(),
            span_id: SpanId::for_span(&candidate.record_id, candidate.span),
            time_range: None,
            stable_locator: candidate.content_hash_at_index_time.clone(),
        };
        self.resolve(&citation, candidate.span)
    }

    /// Resolve one citation, checking all three conditions in §4.7:
    /// record existence + `content_hash` match, span-in-bounds, and
    /// lineage reconstruction to a Stage-1-complete frame.
    pub fn resolve(&self, citation: &Citation, span: SpanOffsets) -> Result<Record, CitationFault> {
        let record = self
            .store
            .get(&citation.record_id)
            .map_err(|_| CitationFault::RecordMissing)?
            .ok_or(CitationFault::RecordMissing)?;

        if !record.attributes_hash_matches() {
            return Err(CitationFault::ContentHashMismatch);
        }

        if !span.is_whole() {
            let text_len = record
                .attributes
                .get("text")
                .and_then(|v| v.as_str())
                .map(str::len)
                .unwrap_or(0);
            if span.start > span.end || span.end > text_len {
                return Err(CitationFault::SpanOutOfBounds);
            }
        }

        self.reconstruct_lineage(&record).map_err(|_| CitationFault::LineageUnreconstructable)?;

        Ok(record)
    }

    /// Walk `input_refs` back to an `evidence.capture.frame` record and
    /// confirm Stage-1 marked it complete (§4.7 "lineage path ... can be
    /// reconstructed").
    fn reconstruct_lineage(&self, record: &Record) -> Result<RecordId, ScrybeError> {
        let mut current = record.clone();
        let mut hops = 0;
        const MAX_HOPS: u32 = 16;

        loop {
            if current.record_type == RecordType::EvidenceCaptureFrame {
                return self.confirm_stage1_complete(&current.record_id);
            }
            hops += 1;
            if hops > MAX_HOPS {
                return Err(ScrybeError::ContractIncomplete("lineage exceeds maximum hop count".to_string()));
            }
            let Some(parent_id) = current.input_refs.first().cloned() else {
                return Err(ScrybeError::ContractIncomplete("record has no input_refs to trace lineage".to_string()));
            };
            current = self
                .store
                .get(&parent_id)?
                .ok_or_else(|| ScrybeError::ContractIncomplete(format!("lineage parent {parent_id} missing")))?;
        }
    }

    fn confirm_stage1_complete(&self, frame_id: &RecordId) -> Result<RecordId, ScrybeError> {
        let completion_id = scrybe_types::derive_record_id(
            RecordType::DerivedIngestStage1Complete,
            &[frame_id.clone()],
            "stage1-complete",
        );
        let completion = self
            .store
            .get(&completion_id)?
            .ok_or_else(|| ScrybeError::ContractIncomplete(format!("frame {frame_id} has no stage1-complete record")))?;
        match completion.attributes.get("reason").and_then(|v| v.as_str()) {
            Some("ok") => Ok(frame_id.clone()),
            _ => Err(ScrybeError::ContractIncomplete(format!("frame {frame_id} stage1 incomplete"))),
        }
    }
}
