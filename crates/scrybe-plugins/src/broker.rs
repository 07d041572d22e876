//! Capability broker (§4.4): the single place that decides whether a
//! plugin may exercise a capability. Denies anything not declared on
//! the plugin's manifest, and enforces stage-scoped policy (e.g.
//! `media.read` is Stage-1-only) on top of the manifest's own
//! `stage_scope`.

use std::collections::HashMap;

use scrybe_types::ScrybeError;

use crate::capability::Capability;
use crate::manifest::{PluginManifest, StageScope};

/// Capabilities that, regardless of what a manifest declares, are only
/// ever granted to plugins scoped to a specific stage (§4.3 "the
/// capability broker denies the relevant capability to Stage-1
/// plugins" for OCR/VLM/embedding; mirrored here for `media.read`,
/// which only Stage-1 plugins may hold per §4.4).
fn stage_lock_for(tag: &str) -> Option<StageScope> {
    match tag {
        "media.read" => Some(StageScope::Stage1),
        _ => None,
    }
}

pub struct CapabilityBroker {
    manifests: HashMap<String, PluginManifest>,
}

impl CapabilityBroker {
    pub fn new(manifests: Vec<PluginManifest>) -> Self {
        Self { manifests: manifests.into_iter().map(|m| (m.plugin_id.clone(), m)).collect() }
    }

    pub fn manifest(&self, plugin_id: &str) -> Option<&PluginManifest> {
        self.manifests.get(plugin_id)
    }

    /// All registered manifests scoped to `scope` (or `StageScope::Any`
    /// entries, which are visible regardless of the requested scope).
    /// Used by the Stage-2 drain loop to discover which extractor
    /// plugins it may dispatch work to without hand-maintaining a
    /// separate list.
    pub fn manifests_for_stage(&self, scope: StageScope) -> Vec<&PluginManifest> {
        self.manifests
            .values()
            .filter(|m| m.stage_scope == scope || m.stage_scope == StageScope::Any)
            .collect()
    }

    /// Check whether `plugin_id` may exercise `requested` right now.
    /// Returns `Ok(())` or a `CapabilityDenied` error naming the reason.
    pub fn check(&self, plugin_id: &str, requested: &Capability) -> Result<(), ScrybeError> {
        let manifest = self
            .manifests
            .get(plugin_id)
            .ok_or_else(|| ScrybeError::CapabilityDenied(format!("unknown plugin `{plugin_id}`")))?;

        if let Some(required_scope) = stage_lock_for(&requested.tag) {
            if !required_scope.permits(manifest.stage_scope) {
                return Err(ScrybeError::CapabilityDenied(format!(
                    "capability `{}` is restricted to {required_scope:?} plugins; `{plugin_id}` is {:?}",
                    requested.tag, manifest.stage_scope
                )));
            }
        }

        let declared = manifest.parsed_capabilities()?;
        if declared.iter().any(|c| c.covers(requested)) {
            Ok(())
        } else {
            Err(ScrybeError::CapabilityDenied(format!(
                "plugin `{plugin_id}` has no declared capability covering `{}`",
                requested.tag
            )))
        }
    }
}
