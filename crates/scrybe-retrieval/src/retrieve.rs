//! Top-level retrieval entry point (§4.7 "Retrieval contract:
//! `retrieve(query_plan) → ordered candidate list`, bounded latency and
//! candidate count; no implicit on-demand extraction").

use scrybe_store::EvidenceStore;
use scrybe_types::ScrybeError;

use crate::lexical::LexicalIndex;
use crate::ordering::order_candidates;
use crate::time_index::retrieve_by_time;
use crate::types::{Candidate, QueryPlan};

/// Runs the lexical and time indices over the requested record types
/// and merges their candidates into one deterministically-ordered list,
/// bounded by `query_plan.limit`. Never invokes a plugin or reads raw
/// media — every record consulted is already normalized (§4.8 contract
/// counters `raw_media_reads_total=0`, `schedule_extract_requests_total=0`
/// depend on this).
pub fn retrieve(store: &EvidenceStore, query_plan: &QueryPlan, now_utc: i64) -> Result<Vec<Candidate>, ScrybeError> {
    let time_range = query_plan.time_range.clone().unwrap_or(i64::MIN..i64::MAX);

    let mut candidates = Vec::new();
    if !query_plan.query_text.trim().is_empty() {
        let index = LexicalIndex::build(store, &query_plan.record_types, time_range.clone())?;
        candidates.extend(index.search(&query_plan.query_text, query_plan.limit));
    }
    if candidates.is_empty() {
        for &record_type in &query_plan.record_types {
            candidates.extend(retrieve_by_time(store, record_type, time_range.clone(), now_utc, query_plan.limit)?);
        }
    }

    let mut ordered = order_candidates(candidates);
    ordered.truncate(query_plan.limit);
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_config::StoreConfig;
    use scrybe_store::NoCipher;
    use scrybe_types::{derive_record_id, Producer, Record, RecordId, RecordType};
    use uuid::Uuid;

    fn frame(ts: i64, seed: &str) -> Record {
        let attrs = serde_json::json!({
            "image_sha256": "x", "width": 1, "height": 1,
            "segment_id": "seg", "frame_index": ts,
            "thumb_sha256": "y", "thumb_algo": "64x64"
        });
        Record {
            record_id: derive_record_id(RecordType::EvidenceCaptureFrame, &[], seed),
            record_type: RecordType::EvidenceCaptureFrame,
            run_id: Uuid::nil(),
            ts_utc: ts,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![],
            schema_version: 1,
            attributes: attrs,
        }
    }

    fn ocr(frame_id: &RecordId, text: &str) -> Record {
        let attrs = serde_json::json!({
            "source_frame_id": frame_id.as_str(), "extractor_id": "ocr-stub",
            "model_version": "tesseract-5", "prompt_fingerprint": "none",
            "quality": {}, "text": text,
        });
        Record {
            record_id: derive_record_id(RecordType::DerivedTextOcr, &[frame_id.clone()], "ocr"),
            record_type: RecordType::DerivedTextOcr,
            run_id: Uuid::nil(),
            ts_utc: 2,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::plugin("ocr-stub", "1.0.0"),
            input_refs: vec![frame_id.clone()],
            schema_version: 1,
            attributes: attrs,
        }
    }

    #[tokio::test]
    async fn text_query_prefers_lexical_over_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig { data_dir: dir.path().to_string_lossy().to_string(), ..Default::default() };
        let store = EvidenceStore::open(&config, &NoCipher).await.unwrap();
        let f = frame(1, "seg:0");
        store.put_new(&f).unwrap();
        store.put_new(&ocr(&f.record_id, "invoice total due")).unwrap();

        let plan = QueryPlan {
            query_text: "invoice".to_string(),
            record_types: vec![RecordType::DerivedTextOcr],
            time_range: None,
            limit: 5,
        };
        let hits = retrieve(&store, &plan, 100).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn empty_query_falls_back_to_time_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig { data_dir: dir.path().to_string_lossy().to_string(), ..Default::default() };
        let store = EvidenceStore::open(&config, &NoCipher).await.unwrap();
        store.put_new(&frame(1, "seg:0")).unwrap();
        store.put_new(&frame(2, "seg:1")).unwrap();

        let plan = QueryPlan {
            query_text: String::new(),
            record_types: vec![RecordType::EvidenceCaptureFrame],
            time_range: None,
            limit: 5,
        };
        let hits = retrieve(&store, &plan, 100).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
