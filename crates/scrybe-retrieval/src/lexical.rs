//! In-memory lexical index over text-bearing records (§4.7).
//!
//! Built by scanning the evidence store rather than maintained
//! incrementally — retrieval latency is bounded by the scan cost of one
//! `record_type` range, which `RecordStore`'s time index already makes
//! cheap (§4.1).

use std::collections::BTreeMap;
use std::ops::Range;

use scrybe_store::EvidenceStore;
use scrybe_types::{RecordId, RecordType, ScrybeError};

use crate::tokenize::tokenize;
use crate::types::{Candidate, SpanOffsets};

/// One indexed record's term set and content hash at index time.
struct IndexedDoc {
    record_id: RecordId,
    record_type: RecordType,
    terms: std::collections::BTreeSet<String>,
    content_hash: String,
}

/// A point-in-time lexical index. Rebuild by calling [`LexicalIndex::build`]
/// again; the index never mutates records, only reads them.
pub struct LexicalIndex {
    docs: Vec<IndexedDoc>,
}

/// Extracts the free-text payload a derived record carries, when
/// present. Extractors are expected to place their output under a
/// `text` field alongside the schema's mandatory provenance fields
/// (§3's schema only pins the provenance shape, not the payload body).
fn extract_text(attributes: &serde_json::Value) -> Option<&str> {
    attributes.get("text").and_then(|v| v.as_str())
}

impl LexicalIndex {
    pub fn build(
        store: &EvidenceStore,
        record_types: &[RecordType],
        time_range: Range<i64>,
    ) -> Result<Self, ScrybeError> {
        let mut docs = Vec::new();
        for &record_type in record_types {
            for record in store.scan(record_type, time_range.clone())? {
                if let Some(text) = extract_text(&record.attributes) {
                    docs.push(IndexedDoc {
                        record_id: record.record_id,
                        record_type,
                        terms: tokenize(text),
                        content_hash: record.content_hash,
                    });
                }
            }
        }
        Ok(Self { docs })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Overlap-ratio search (§4.7 tie-break is applied by the caller,
    /// not here — this only computes per-candidate scores).
    pub fn search(&self, query_text: &str, limit: usize) -> Vec<Candidate> {
        let query_terms = tokenize(query_text);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: BTreeMap<String, Candidate> = BTreeMap::new();
        for doc in &self.docs {
            let overlap = query_terms.intersection(&doc.terms).count() as f32;
            if overlap == 0.0 {
                continue;
            }
            let score = overlap / query_terms.len() as f32;
            scored.insert(
                doc.record_id.as_str().to_string(),
                Candidate {
                    record_id: doc.record_id.clone(),
                    record_type: doc.record_type,
                    span: SpanOffsets::whole(),
                    content_hash_at_index_time: doc.content_hash.clone(),
                    score,
                },
            );
        }

        let mut candidates: Vec<Candidate> = scored.into_values().collect();
        candidates.sort_by(crate::ordering::candidate_cmp);
        candidates.truncate(limit);
        candidates
    }
}
