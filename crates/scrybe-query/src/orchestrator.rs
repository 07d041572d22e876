//! Query Orchestrator (C8, §4.8). Read-only: classifies intent, routes
//! to normalized record kinds, retrieves via C7, and assembles an
//! answer with binding citations — never reads raw media, never
//! schedules Stage-2 extraction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use scrybe_config::QueryConfig;
use scrybe_retrieval::{retrieve, CitationResolver, QueryPlan, SpanOffsets};
use scrybe_store::EvidenceStore;
use scrybe_types::sha256_hex;

use crate::answer::{assemble_answer_text, BoundCitation, ConfidenceBand, QueryResponse, QueryState};
use crate::intents::classify;
use crate::trace::{QueryTraceEntry, QueryTraceLog};

/// Counters the query path is contractually required to keep at zero
/// (§4.8 "Contract counters"): the orchestrator never increments
/// either, since it never calls `EvidenceStore::blobs` or any plugin
/// scheduling API. Exposed so callers (and tests) can assert the
/// contract rather than trust it by inspection alone.
#[derive(Default)]
pub struct ContractCounters {
    pub raw_media_reads_total: AtomicU64,
    pub schedule_extract_requests_total: AtomicU64,
}

impl ContractCounters {
    pub fn snapshot(&self) -> (u64, u64) {
        (self.raw_media_reads_total.load(Ordering::Relaxed), self.schedule_extract_requests_total.load(Ordering::Relaxed))
    }
}

pub struct QueryOrchestrator {
    store: Arc<EvidenceStore>,
    config: QueryConfig,
    trace_log: Arc<QueryTraceLog>,
    counters: ContractCounters,
}

impl QueryOrchestrator {
    pub fn new(store: Arc<EvidenceStore>, config: QueryConfig, trace_log: Arc<QueryTraceLog>) -> Self {
        Self { store, config, trace_log, counters: ContractCounters::default() }
    }

    pub fn counters(&self) -> &ContractCounters {
        &self.counters
    }

    /// Answer one query end to end (§4.8 steps 1-5). `now_utc` is
    /// supplied by the caller (daemon) rather than read from the clock
    /// here, keeping this function a pure mapping from inputs to output
    /// for replay/testing.
    pub async fn answer(&self, query_text: &str, now_utc: i64) -> QueryResponse {
        let started = Instant::now();
        let query_hash = sha256_hex(query_text.as_bytes());

        let response = match classify(query_text) {
            Err(reason) => QueryResponse::needs_clarification(query_hash.clone(), reason.as_str()),
            Ok(intent) => {
                let plan = QueryPlan {
                    query_text: query_text.to_string(),
                    record_types: intent.required_record_types().to_vec(),
                    time_range: None,
                    limit: 8,
                };
                match retrieve(&self.store, &plan, now_utc) {
                    Err(_) => QueryResponse::not_found(query_hash.clone()),
                    Ok(candidates) if candidates.is_empty() => QueryResponse::not_found(query_hash.clone()),
                    Ok(candidates) => {
                        let resolver = CitationResolver::new(&self.store);
                        let mut bound = Vec::new();
                        for candidate in &candidates {
                            if resolver.resolve_candidate(candidate).is_ok() {
                                bound.push(BoundCitation {
                                    record_id: candidate.record_id.as_str().to_string(),
                                    span_id: scrybe_retrieval::SpanId::for_span(&candidate.record_id, candidate.span)
                                        .0,
                                    record_type: record_type_label(candidate.record_type),
                                });
                            }
                        }

                        if bound.is_empty() {
                            // §4.7: an answer with no valid citation is downgraded to NOT_FOUND.
                            QueryResponse::not_found(query_hash.clone())
                        } else {
                            let top_score = candidates.first().map(|c| c.score);
                            QueryResponse {
                                state: QueryState::Ok,
                                answer: Some(assemble_answer_text(intent.as_str(), &candidates)),
                                citations: bound,
                                plugins_in_path: Vec::new(),
                                query_hash: query_hash.clone(),
                                confidence_band: ConfidenceBand::from_top_score(top_score),
                            }
                        }
                    }
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > self.config.p95_latency_ms_budget {
            tracing::warn!(elapsed_ms, budget_ms = self.config.p95_latency_ms_budget, "query exceeded latency budget");
        }

        let trace_entry = QueryTraceEntry {
            query_hash: response.query_hash.clone(),
            mode_used: "USER_QUERY".to_string(),
            plugins_in_path: response.plugins_in_path.clone(),
            citation_ids: response.citations.iter().map(|c| c.record_id.clone()).collect(),
            confidence_band: response.confidence_band.as_str().to_string(),
            state: response.state.as_str().to_string(),
            latency_ms: elapsed_ms,
        };
        if let Err(e) = self.trace_log.append(&trace_entry).await {
            tracing::warn!(error = %e, "failed to append query trace entry");
        }

        response
    }
}

fn record_type_label(record_type: scrybe_types::RecordType) -> &'static str {
    record_type.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_config::StoreConfig;
    use scrybe_store::NoCipher;
    use scrybe_types::{derive_record_id, Producer, Record, RecordId, RecordType};
    use uuid::Uuid;

    async fn open_store(dir: &std::path::Path) -> Arc<EvidenceStore> {
        let config = StoreConfig { data_dir: dir.to_string_lossy().to_string(), ..Default::default() };
        Arc::new(EvidenceStore::open(&config, &NoCipher).await.unwrap())
    }

    fn frame_record() -> Record {
        let attrs = serde_json::json!({
            "image_sha256": "x", "width": 1, "height": 1,
            "segment_id": "seg", "frame_index": 0,
            "thumb_sha256": "y", "thumb_algo": "64x64"
        });
        Record {
            record_id: derive_record_id(RecordType::EvidenceCaptureFrame, &[], "seg:0"),
            record_type: RecordType::EvidenceCaptureFrame,
            run_id: Uuid::nil(),
            ts_utc: 1,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![],
            schema_version: 1,
            attributes: attrs,
        }
    }

    fn stage1_complete(frame_id: &RecordId) -> Record {
        let attrs = serde_json::json!({"frame_id": frame_id.as_str(), "reason": "ok"});
        Record {
            record_id: derive_record_id(RecordType::DerivedIngestStage1Complete, &[frame_id.clone()], "stage1-complete"),
            record_type: RecordType::DerivedIngestStage1Complete,
            run_id: Uuid::nil(),
            ts_utc: 1,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![frame_id.clone()],
            schema_version: 1,
            attributes: attrs,
        }
    }

    fn ocr_record(frame_id: &RecordId, text: &str) -> Record {
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
    async fn unrecognized_query_needs_clarification() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let trace_log = Arc::new(QueryTraceLog::open(dir.path().join("trace.jsonl")).await.unwrap());
        let orchestrator = QueryOrchestrator::new(store, QueryConfig::default(), trace_log);

        let response = orchestrator.answer("purple elephant migration", 100).await;
        assert_eq!(response.state, QueryState::NeedsClarification);
    }

    #[tokio::test]
    async fn query_with_no_matching_evidence_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let trace_log = Arc::new(QueryTraceLog::open(dir.path().join("trace.jsonl")).await.unwrap());
        let orchestrator = QueryOrchestrator::new(store, QueryConfig::default(), trace_log);

        let response = orchestrator.answer("what did it say about invoices", 100).await;
        assert_eq!(response.state, QueryState::NotFound);
        assert!(response.citations.is_empty());
    }

    #[tokio::test]
    async fn query_with_resolvable_evidence_returns_ok_with_citation() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let frame = frame_record();
        store.put_new(&frame).unwrap();
        store.put_new(&stage1_complete(&frame.record_id)).unwrap();
        store.put_new(&ocr_record(&frame.record_id, "invoice total due friday")).unwrap();

        let trace_log = Arc::new(QueryTraceLog::open(dir.path().join("trace.jsonl")).await.unwrap());
        let orchestrator = QueryOrchestrator::new(store, QueryConfig::default(), trace_log);

        let response = orchestrator.answer("what did it say about invoices", 100).await;
        assert_eq!(response.state, QueryState::Ok);
        assert!(!response.citations.is_empty());

        let (raw_media, schedule_extract) = orchestrator.counters().snapshot();
        assert_eq!(raw_media, 0);
        assert_eq!(schedule_extract, 0);
    }
}
