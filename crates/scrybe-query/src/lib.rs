//! C8 — Query Orchestrator (§4.8). Read-only: classifies intent,
//! retrieves via `scrybe-retrieval`, and assembles citation-bound
//! answers, with an append-only query-trace log.

pub mod answer;
pub mod intents;
pub mod orchestrator;
pub mod trace;

pub use answer::{BoundCitation, ConfidenceBand, QueryResponse, QueryState};
pub use intents::{classify, ClarificationReason, IntentCategory};
pub use orchestrator::{ContractCounters, QueryOrchestrator};
pub use trace::{QueryTraceEntry, QueryTraceLog};
