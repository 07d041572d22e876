//! Time index over normalized records (§4.7 "a time index keyed by
//! `ts_utc`"). `RecordStore::scan` already maintains the secondary index
//! this needs (§4.1), so this module is a thin recency-scoring layer
//! over it rather than a second copy of the data.

use std::ops::Range;

use scrybe_store::EvidenceStore;
use scrybe_types::{RecordType, ScrybeError};

use crate::types::{Candidate, SpanOffsets};

/// Half-life (hours) recency scoring decays over — grounded in the same
/// shape the teacher's memory retrieval uses for its recency term, with
/// a longer half-life since screen evidence is queried over days, not
/// minutes.
const RECENCY_HALF_LIFE_HOURS: f64 = 24.0;

fn recency_score(now_utc: i64, ts_utc: i64) -> f32 {
    let age_hours = ((now_utc - ts_utc).max(0) as f64) / 3_600_000_000.0;
    (1.0 / (1.0 + age_hours / RECENCY_HALF_LIFE_HOURS)) as f32
}

/// Scan one `record_type` over `time_range` and score each hit by
/// recency, most recent first after tie-break (§4.7).
pub fn retrieve_by_time(
    store: &EvidenceStore,
    record_type: RecordType,
    time_range: Range<i64>,
    now_utc: i64,
    limit: usize,
) -> Result<Vec<Candidate>, ScrybeError> {
    let mut candidates: Vec<Candidate> = store
        .scan(record_type, time_range)?
        .into_iter()
        .map(|record| Candidate {
            score: recency_score(now_utc, record.ts_utc),
            record_id: record.record_id,
            record_type,
            span: SpanOffsets::whole(),
            content_hash_at_index_time: record.content_hash,
        })
        .collect();
    candidates.sort_by(crate::ordering::candidate_cmp);
    candidates.truncate(limit);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_config::StoreConfig;
    use scrybe_store::NoCipher;
    use scrybe_types::{derive_record_id, Producer, Record};
    use uuid::Uuid;

    fn frame(ts: i64) -> Record {
        let attrs = serde_json::json!({
            "image_sha256": "x", "width": 1, "height": 1,
            "segment_id": "seg", "frame_index": ts,
            "thumb_sha256": "y", "thumb_algo": "64x64"
        });
        Record {
            record_id: derive_record_id(RecordType::EvidenceCaptureFrame, &[], &format!("seg:{ts}")),
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

    #[tokio::test]
    async fn more_recent_frame_scores_higher() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig { data_dir: dir.path().to_string_lossy().to_string(), ..Default::default() };
        let store = EvidenceStore::open(&config, &NoCipher).await.unwrap();
        store.put_batch(&[frame(1_000_000), frame(2_000_000_000_000)]).unwrap();

        let hits =
            retrieve_by_time(&store, RecordType::EvidenceCaptureFrame, i64::MIN..i64::MAX, 2_000_000_000_000, 10)
                .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }
}
