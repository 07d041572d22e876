//! C3 — Stage-1 Normalizer and C9 — Retention & Reap-Safety Gate (§4.3,
//! §4.9). Mandatory, cheap normalization: every retained capture
//! candidate becomes a reap-safe record set here, or is dropped with an
//! audit entry. Stage-1 never invokes OCR/VLM/embedding code — see
//! [`dependency_audit`].

pub mod completeness;
pub mod dependency_audit;
pub mod plugin_completion;
pub mod retention;
pub mod stage1;
pub mod uia;

pub use completeness::{is_reap_safe_complete, IncompleteReason};
pub use plugin_completion::{PluginAttempt, PluginOutcome};
pub use retention::{revalidate, RevalidationReport};
pub use stage1::{Stage1Normalizer, Stage1Outcome};
pub use uia::{UiaInput, UiaSectionOutcome};
