//! Inputs describing what the (out-of-scope) UIA observation plugins
//! produced for one frame (§4.3: "zero or three `obs.uia.*` records,
//! zero only when the candidate has no `uia_ref`").

use serde_json::Value;

/// Result of one UIA-section observation attempt.
#[derive(Debug, Clone)]
pub enum UiaSectionOutcome {
    Succeeded { attributes: Value },
    Failed { reason: String },
}

/// The three mandatory UIA projections for a frame that has a `uia_ref`.
/// A `None` section means the responsible plugin never even attempted it
/// — treated the same as `Failed` by the completeness gate.
#[derive(Debug, Clone, Default)]
pub struct UiaInput {
    pub uia_ref: Option<String>,
    pub focus: Option<UiaSectionOutcome>,
    pub context: Option<UiaSectionOutcome>,
    pub operable: Option<UiaSectionOutcome>,
}

impl UiaInput {
    pub fn absent() -> Self {
        Self::default()
    }

    /// Iterates the three sections by name, pairing each with its outcome
    /// (a missing attempt surfaces as `None`).
    pub fn sections(&self) -> [(&'static str, Option<&UiaSectionOutcome>); 3] {
        [
            ("focus", self.focus.as_ref()),
            ("context", self.context.as_ref()),
            ("operable", self.operable.as_ref()),
        ]
    }
}
