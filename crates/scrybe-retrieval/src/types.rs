//! Shared retrieval/citation types (§4.7).

use scrybe_types::{RecordId, RecordType};

/// Byte offsets of a span within the text a record carries. `0..0`
/// means the record's text field is used whole (no sub-span claimed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanOffsets {
    pub start: usize,
    pub end: usize,
}

impl SpanOffsets {
    pub fn whole() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn is_whole(self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// A deterministic identifier for one span within a record — derived
/// from the record's own id plus the span offsets, so it never needs a
/// separate allocation table (Glossary "Citation").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpanId(pub String);

impl SpanId {
    pub fn for_span(record_id: &RecordId, span: SpanOffsets) -> Self {
        Self(format!("{}:{}:{}", record_id.as_str(), span.start, span.end))
    }
}

/// One ranked result of a `retrieve()` call (§4.7 "Retrieval contract").
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record_id: RecordId,
    pub record_type: RecordType,
    pub span: SpanOffsets,
    pub content_hash_at_index_time: String,
    pub score: f32,
}

/// What a caller asks C7 to retrieve for (a subset of the full query
/// plan C8 assembles; kept narrow so C7 never needs to know about
/// intent categories).
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub query_text: String,
    pub record_types: Vec<RecordType>,
    pub time_range: Option<std::ops::Range<i64>>,
    pub limit: usize,
}

/// An immutable pointer to evidence (Glossary "Citation"): `(record_id,
/// span_id, optional time_range, stable_locator)`.
#[derive(Debug, Clone)]
pub struct Citation {
    pub record_id: RecordId,
    pub span_id: SpanId,
    pub time_range: Option<std::ops::Range<i64>>,
    pub stable_locator: String,
}

/// Why a citation failed resolution (§4.7 "A citation failing any check
/// is rejected").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationFault {
    RecordMissing,
    ContentHashMismatch,
    SpanOutOfBounds,
    LineageUnreconstructable,
}

impl CitationFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationFault::RecordMissing => "record_missing",
            CitationFault::ContentHashMismatch => "content_hash_mismatch",
            CitationFault::SpanOutOfBounds => "span_out_of_bounds",
            CitationFault::LineageUnreconstructable => "lineage_unreconstructable",
        }
    }
}
