//! Optional vector index over embedder outputs (§4.7, §9 Open Question).
//!
//! No embedding backend ships in this workspace; this module only fixes
//! the seam a future one would plug into. Compiled only under the
//! `vector-index` feature so a default build never pulls in an
//! embedding dependency it can't satisfy.

use scrybe_types::RecordId;

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub record_id: RecordId,
    pub cosine_similarity: f32,
}

/// A pluggable nearest-neighbor backend. A real implementation would
/// wrap an ANN index (e.g. hnsw) keyed by the same `record_id`s the
/// lexical and time indices use, so candidates from all three merge on
/// a common key.
pub trait VectorIndex: Send + Sync {
    fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<VectorHit>;
}

/// Used when no vector backend is configured; always returns no hits so
/// callers can unconditionally consult a `VectorIndex` without a
/// `Some`/`None` branch at every call site.
pub struct NoVectorIndex;

impl VectorIndex for NoVectorIndex {
    fn search(&self, _query_embedding: &[f32], _limit: usize) -> Vec<VectorHit> {
        Vec::new()
    }
}
