//! C9 — Retention & Reap-Safety Gate. `retention.eligible` is only ever
//! emitted from inside [`crate::stage1::Stage1Normalizer`] through the
//! completeness gate (§4.9); this module is the historical revalidation
//! procedure that re-audits existing markers, e.g. after a schema
//! upgrade changes what "complete" means, and never deletes anything.

use scrybe_store::EvidenceStore;
use scrybe_types::{derive_record_id, RecordType, ScrybeError};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct RevalidationReport {
    pub markers_scanned: usize,
    pub markers_quarantined: usize,
}

/// Re-checks every `retention.eligible` marker in `time_range` against
/// its frame's current plugin-completion record. A marker whose frame
/// now shows a failed plugin attempt (e.g. because a stricter Stage-1
/// plugin contract was deployed) gets a compensating `audit.quarantine`
/// entry — the marker record itself is left untouched; markers are
/// never deleted or rewritten (§4.9).
pub async fn revalidate(
    store: &EvidenceStore,
    run_id: Uuid,
    time_range: std::ops::Range<i64>,
) -> Result<RevalidationReport, ScrybeError> {
    let markers = store.scan(RecordType::RetentionEligible, time_range)?;
    let mut report = RevalidationReport { markers_scanned: markers.len(), markers_quarantined: 0 };

    for (i, marker) in markers.iter().enumerate() {
        let frame_id = match marker.attributes.get("frame_id").and_then(|v| v.as_str()) {
            Some(id) => id,
            None => continue,
        };
        let frame_record_id = marker.input_refs.first().cloned().unwrap_or_else(|| {
            scrybe_types::RecordId(frame_id.to_string())
        });
        let completion_id = derive_record_id(
            RecordType::DerivedIngestPluginCompletion,
            &[frame_record_id],
            "plugin-completion",
        );
        let completion = match store.get(&completion_id)? {
            Some(r) => r,
            None => continue,
        };
        let still_passes = completion
            .attributes
            .get("plugins")
            .and_then(|v| v.as_array())
            .map(|plugins| plugins.iter().all(|p| p.get("outcome").and_then(|o| o.as_str()) != Some("failed")))
            .unwrap_or(true);

        if !still_passes {
            let ordinal = format!("revalidate:{i}");
            let quarantine = scrybe_audit::quarantine(
                run_id,
                0,
                &ordinal,
                &scrybe_types::RecordId(frame_id.to_string()),
                "contract_incomplete:revalidation_failed_plugin",
            );
            store.append_ledger(quarantine).await?;
            report.markers_quarantined += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage1::Stage1Normalizer;
    use crate::uia::UiaInput;
    use scrybe_capture::{FrameBuffer, FrameCandidate};
    use scrybe_config::StoreConfig;
    use scrybe_store::NoCipher;

    async fn store() -> std::sync::Arc<EvidenceStore> {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig { data_dir: dir.path().to_string_lossy().to_string(), ..Default::default() };
        std::sync::Arc::new(EvidenceStore::open(&config, &NoCipher).await.unwrap())
    }

    #[tokio::test]
    async fn clean_store_revalidates_with_nothing_quarantined() {
        let store = store().await;
        let norm = Stage1Normalizer::new(store.clone(), Uuid::nil(), 144);
        norm.ingest_frame(
            FrameCandidate {
                segment_id: "seg-a".into(),
                frame: FrameBuffer { width: 1, height: 1, bytes: vec![1] },
                thumb_sha256: "fp".into(),
                thumb_algo: "64x64".into(),
            },
            0,
            1000,
            0,
            UiaInput::absent(),
            vec![],
        )
        .await
        .unwrap();

        let report = revalidate(&store, Uuid::nil(), 0..i64::MAX).await.unwrap();
        assert_eq!(report.markers_scanned, 1);
        assert_eq!(report.markers_quarantined, 0);
    }

    /// Builds a legacy-style record set directly (bypassing
    /// `Stage1Normalizer`, whose own gate would never let a failed-plugin
    /// frame carry a `retention.eligible` marker in the first place) to
    /// stand in for data written under an older, looser contract.
    fn legacy_frame_with_failed_plugin(frame_id: &scrybe_types::RecordId) -> Vec<scrybe_types::Record> {
        use scrybe_types::Producer;

        let completion_attrs = serde_json::json!({
            "frame_id": frame_id.as_str(),
            "plugins": [{"plugin_id": "hid-linker", "capability": "input.summary", "outcome": "failed", "detail": null}],
        });
        let completion = scrybe_types::Record {
            record_id: derive_record_id(RecordType::DerivedIngestPluginCompletion, &[frame_id.clone()], "plugin-completion"),
            record_type: RecordType::DerivedIngestPluginCompletion,
            run_id: Uuid::nil(),
            ts_utc: 1000,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&completion_attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![frame_id.clone()],
            schema_version: 1,
            attributes: completion_attrs,
        };

        let retention_attrs = serde_json::json!({
            "frame_id": frame_id.as_str(), "reason_code": "ok", "horizon_hint_hours": 144,
        });
        let retention = scrybe_types::Record {
            record_id: derive_record_id(RecordType::RetentionEligible, &[frame_id.clone()], "retention"),
            record_type: RecordType::RetentionEligible,
            run_id: Uuid::nil(),
            ts_utc: 1000,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&retention_attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![frame_id.clone()],
            schema_version: 1,
            attributes: retention_attrs,
        };

        vec![completion, retention]
    }

    #[tokio::test]
    async fn legacy_marker_whose_plugin_record_shows_failure_gets_quarantined() {
        let store = store().await;
        let frame_id = scrybe_types::RecordId("legacy-frame".to_string());
        store.put_batch(&legacy_frame_with_failed_plugin(&frame_id)).unwrap();

        let report = revalidate(&store, Uuid::nil(), 0..i64::MAX).await.unwrap();
        assert_eq!(report.markers_scanned, 1);
        assert_eq!(report.markers_quarantined, 1);
    }
}
