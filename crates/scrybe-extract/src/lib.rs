//! C6 — Stage-2 Extractor Pipeline (§4.6). Bounded-parallel, content-hash
//! deduped invocation of OCR/VLM/etc. plugins against Stage-1-complete
//! frames, gated by the governor's admission and preemption rules.

pub mod job;
pub mod lag;
pub mod pool;
pub mod scan;

pub use job::ExtractJob;
pub use lag::{lag_is_warning, projected_lag_hours, ParallelismCap};
pub use pool::{ExtractOutcome, ExtractWorkerPool};
pub use scan::{pending_jobs, record_type_for_capability};
