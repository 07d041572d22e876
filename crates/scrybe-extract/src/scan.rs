//! Discovers pending Stage-2 work (§4.6 step 1: "Resolves its input
//! frame id; reads only normalized artifacts via C1"). Maps each
//! Stage-2 manifest's declared `records.write(<type>)` capabilities to
//! the `RecordType` they authorize, then pairs every Stage-1-complete
//! frame lacking that derived record into a ready-to-submit
//! [`ExtractJob`]. The per-job content-hash reuse check in
//! [`crate::pool::ExtractWorkerPool::run_job`] makes re-scanning the
//! same frame on a later tick harmless.

use scrybe_plugins::PluginManifest;
use scrybe_store::EvidenceStore;
use scrybe_types::{RecordId, RecordType, ScrybeError};

use crate::job::ExtractJob;

/// `records.write(derived.text.ocr)` -> `Some(RecordType::DerivedTextOcr)`.
/// The wildcard form `records.write(derived.text.*)` declares a
/// capability family rather than naming one concrete output type, so it
/// yields `None` here — a manifest that wants automatic job discovery
/// must declare the concrete type(s) it writes.
pub fn record_type_for_capability(capability: &str) -> Option<RecordType> {
    let inner = capability.strip_prefix("records.write(")?.strip_suffix(')')?;
    RecordType::parse(inner).ok()
}

/// Every Stage-1-complete (`reason: ok`) frame in `time_range` that has
/// no derived record yet for one of `manifest`'s declared output types.
pub fn pending_jobs(
    store: &EvidenceStore,
    manifest: &PluginManifest,
    time_range: std::ops::Range<i64>,
) -> Result<Vec<ExtractJob>, ScrybeError> {
    let record_types: Vec<(String, RecordType)> = manifest
        .capabilities
        .iter()
        .filter_map(|c| record_type_for_capability(c).map(|rt| (c.clone(), rt)))
        .collect();
    if record_types.is_empty() {
        return Ok(Vec::new());
    }

    let completions = store.scan(RecordType::DerivedIngestStage1Complete, time_range)?;
    let mut jobs = Vec::new();
    for completion in completions {
        if completion.attributes.get("reason").and_then(|v| v.as_str()) != Some("ok") {
            continue;
        }
        let Some(frame_id_str) = completion.attributes.get("frame_id").and_then(|v| v.as_str()) else {
            continue;
        };
        let frame_id = RecordId(frame_id_str.to_string());
        let Some(frame) = store.get(&frame_id)? else { continue };

        for (capability, record_type) in &record_types {
            jobs.push(ExtractJob {
                frame_id: frame_id.clone(),
                frame_content_hash: frame.content_hash.clone(),
                extractor_id: manifest.plugin_id.clone(),
                extractor_version: manifest.version.clone(),
                model_version: manifest.version.clone(),
                prompt_fingerprint: "default".to_string(),
                config_hash: "default".to_string(),
                capability: capability.clone(),
                record_type: *record_type,
            });
        }
    }
    Ok(jobs)
}
