//! The completeness gate (§4.3 "Completeness gate"): a pure predicate
//! over metadata that is the single source of truth for retention
//! emission AND Stage-2 admission. Reads no blob bytes.

use crate::plugin_completion::{PluginAttempt, PluginOutcome};
use crate::uia::{UiaInput, UiaSectionOutcome};

/// Why a frame failed `is_reap_safe_complete`. Each carries a stable,
/// machine-readable reason code for the withholding audit entry (§4.3,
/// §8 scenario 3: `contract_incomplete:obs_uia_context_missing`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    ObsUiaSectionMissing(&'static str),
    PluginAttemptFailed(String),
}

impl IncompleteReason {
    pub fn code(&self) -> String {
        match self {
            IncompleteReason::ObsUiaSectionMissing(section) => {
                format!("contract_incomplete:obs_uia_{section}_missing")
            }
            IncompleteReason::PluginAttemptFailed(plugin_id) => {
                format!("contract_incomplete:plugin_failed:{plugin_id}")
            }
        }
    }
}

/// `Ok(())` iff the frame's metadata is sufficient for queries without
/// the raw blob (§4.3, Glossary "Reap-safe"). Reads only `uia` and
/// `plugins` — never the frame bytes — so Stage-2 admission can reuse
/// the exact same check cheaply.
pub fn is_reap_safe_complete(uia: &UiaInput, plugins: &[PluginAttempt]) -> Result<(), Vec<IncompleteReason>> {
    let mut reasons = Vec::new();

    if uia.uia_ref.is_some() {
        for (section, outcome) in uia.sections() {
            match outcome {
                Some(UiaSectionOutcome::Succeeded { .. }) => {}
                Some(UiaSectionOutcome::Failed { .. }) | None => {
                    reasons.push(IncompleteReason::ObsUiaSectionMissing(section));
                }
            }
        }
    }

    for attempt in plugins {
        if attempt.outcome == PluginOutcome::Failed {
            reasons.push(IncompleteReason::PluginAttemptFailed(attempt.plugin_id.clone()));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_uia_ref_and_no_failed_plugins_is_complete() {
        let uia = UiaInput::absent();
        assert!(is_reap_safe_complete(&uia, &[]).is_ok());
    }

    #[test]
    fn missing_context_section_is_incomplete() {
        let uia = UiaInput {
            uia_ref: Some("snap-1".to_string()),
            focus: Some(UiaSectionOutcome::Succeeded { attributes: serde_json::json!({"node_index": 0}) }),
            context: None,
            operable: Some(UiaSectionOutcome::Succeeded { attributes: serde_json::json!({"node_index": 2}) }),
        };
        let err = is_reap_safe_complete(&uia, &[]).unwrap_err();
        assert_eq!(err, vec![IncompleteReason::ObsUiaSectionMissing("context")]);
        assert_eq!(err[0].code(), "contract_incomplete:obs_uia_context_missing");
    }

    #[test]
    fn failed_plugin_attempt_is_incomplete() {
        let uia = UiaInput::absent();
        let plugins = vec![PluginAttempt {
            plugin_id: "hid-linker".into(),
            capability: "input.summary".into(),
            outcome: PluginOutcome::Failed,
            detail: Some("timeout".into()),
        }];
        let err = is_reap_safe_complete(&uia, &plugins).unwrap_err();
        assert_eq!(err, vec![IncompleteReason::PluginAttemptFailed("hid-linker".to_string())]);
    }

    #[test]
    fn all_three_sections_present_is_complete() {
        let outcome = |i: u64| UiaSectionOutcome::Succeeded { attributes: serde_json::json!({"node_index": i}) };
        let uia = UiaInput {
            uia_ref: Some("snap-1".to_string()),
            focus: Some(outcome(0)),
            context: Some(outcome(1)),
            operable: Some(outcome(2)),
        };
        assert!(is_reap_safe_complete(&uia, &[]).is_ok());
    }
}
