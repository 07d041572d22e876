//! Plugin manifest (§4.4): declares a plugin's identity, the
//! capabilities it needs, and which pipeline stage it is allowed to run
//! in. Manifests are loaded from the lock file (`lock.rs`), not
//! discovered by scanning arbitrary directories — there is no
//! runtime-reflection plugin discovery in this design (§9).

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageScope {
    Stage1,
    Stage2,
    /// Plugins permitted from either stage (rare; reserved for shared
    /// utility capabilities like `evidence.read`).
    Any,
}

impl StageScope {
    pub fn permits(self, caller: StageScope) -> bool {
        match self {
            StageScope::Any => true,
            scope => scope == caller,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub plugin_id: String,
    pub version: String,
    /// Path to the plugin's executable artifact (native binary or
    /// `.wasm` module), relative to the plugin directory.
    pub artifact_path: String,
    pub content_sha256: String,
    pub stage_scope: StageScope,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
}

impl PluginManifest {
    pub fn parsed_capabilities(&self) -> Result<Vec<Capability>, scrybe_types::ScrybeError> {
        self.capabilities.iter().map(|c| Capability::parse(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_scope_any_permits_both() {
        assert!(StageScope::Any.permits(StageScope::Stage1));
        assert!(StageScope::Any.permits(StageScope::Stage2));
    }

    #[test]
    fn stage1_scope_denies_stage2_caller() {
        assert!(!StageScope::Stage1.permits(StageScope::Stage2));
    }

    #[test]
    fn parses_declared_capability_strings() {
        let manifest = PluginManifest {
            plugin_id: "ocr-stub".to_string(),
            version: "1.0.0".to_string(),
            artifact_path: "ocr-stub".to_string(),
            content_sha256: "abc".to_string(),
            stage_scope: StageScope::Stage2,
            capabilities: vec!["media.read(source=stage1)".to_string(), "records.write(derived.text.ocr)".to_string()],
            deprecated: false,
        };
        let caps = manifest.parsed_capabilities().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].tag, "media.read");
    }
}
