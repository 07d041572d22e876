//! C7 — Retrieval & Citation Resolver (§4.7). Builds time and lexical
//! indices over normalized records and resolves citations back to
//! immutable evidence, with deterministic tie-break ordering throughout.

pub mod lexical;
pub mod ordering;
pub mod resolver;
pub mod retrieve;
pub mod time_index;
pub mod tokenize;
pub mod types;
#[cfg(feature = "vector-index")]
pub mod vector;

pub use lexical::LexicalIndex;
pub use ordering::order_candidates;
pub use resolver::CitationResolver;
pub use retrieve::retrieve;
pub use time_index::retrieve_by_time;
pub use tokenize::tokenize;
pub use types::{Candidate, Citation, CitationFault, QueryPlan, SpanId, SpanOffsets};
#[cfg(feature = "vector-index")]
pub use vector::{NoVectorIndex, VectorHit, VectorIndex};
