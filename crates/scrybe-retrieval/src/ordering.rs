//! Deterministic tie-break ordering for retrieval results (§4.7 "all
//! ranking resolves ties by `(score_desc, record_id_asc, span_id_asc)`").

use std::cmp::Ordering;

use crate::types::{Candidate, SpanId};

pub fn candidate_cmp(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.record_id.as_str().cmp(b.record_id.as_str()))
        .then_with(|| {
            let span_a = SpanId::for_span(&a.record_id, a.span);
            let span_b = SpanId::for_span(&b.record_id, b.span);
            span_a.cmp(&span_b)
        })
}

pub fn order_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(candidate_cmp);
    candidates
}
