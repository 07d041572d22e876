//! Per-frame Stage-1 plugin completion vector (§4.3).

/// Terminal state of one Stage-1 plugin's attempt against a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginOutcome {
    Succeeded,
    Failed,
    Skipped,
    Canceled,
}

impl PluginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginOutcome::Succeeded => "succeeded",
            PluginOutcome::Failed => "failed",
            PluginOutcome::Skipped => "skipped",
            PluginOutcome::Canceled => "canceled",
        }
    }
}

/// One entry in the `derived.ingest.plugin.completion` vector.
#[derive(Debug, Clone)]
pub struct PluginAttempt {
    pub plugin_id: String,
    pub capability: String,
    pub outcome: PluginOutcome,
    pub detail: Option<String>,
}

impl PluginAttempt {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "plugin_id": self.plugin_id,
            "capability": self.capability,
            "outcome": self.outcome.as_str(),
            "detail": self.detail,
        })
    }
}
