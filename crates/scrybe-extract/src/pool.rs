//! Stage-2 bounded-parallel extraction worker pool (§4.6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scrybe_config::RetentionConfig;
use scrybe_governor::{Governor, Mode};
use scrybe_plugins::{PluginHost, PluginManifest, PluginRequest, ResponseStatus};
use scrybe_store::EvidenceStore;
use scrybe_types::{Producer, Record, RecordId, ScrybeError};
use tokio::sync::watch;
use uuid::Uuid;

use crate::job::ExtractJob;
use crate::lag::ParallelismCap;

/// Bounded number of attempts before a job is given up on as a
/// transient failure (§4.6 "bounded retries with backoff").
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_BASE_MS: u64 = 100;

/// Outcome of running one [`ExtractJob`] through the pool.
#[derive(Debug)]
pub enum ExtractOutcome {
    /// A derived record already existed for this job's dedupe key and
    /// was reused verbatim (§4.6 "cheap-first reuse").
    Reused(RecordId),
    /// A new derived record was computed and persisted.
    Computed(RecordId),
    /// The governor denied admission or ordered preemption before
    /// completion; no derived record was written.
    Canceled,
    /// The plugin failed on every attempt.
    Failed(ScrybeError),
}

/// Owns the plugin host, evidence store, and governor handle a Stage-2
/// run needs, plus the dynamic parallelism cap the lag estimator may
/// grow (§4.6).
pub struct ExtractWorkerPool {
    store: Arc<EvidenceStore>,
    plugin_host: Arc<PluginHost>,
    governor: Arc<Governor>,
    run_id: Uuid,
    cap: AtomicUsize,
    ceiling: usize,
}

impl ExtractWorkerPool {
    pub fn new(
        store: Arc<EvidenceStore>,
        plugin_host: Arc<PluginHost>,
        governor: Arc<Governor>,
        retention: &RetentionConfig,
        run_id: Uuid,
        initial_parallelism: usize,
    ) -> Self {
        let cap = ParallelismCap::new(initial_parallelism, retention.max_parallelism_ceiling);
        Self {
            store,
            plugin_host,
            governor,
            run_id,
            cap: AtomicUsize::new(cap.current()),
            ceiling: retention.max_parallelism_ceiling,
        }
    }

    pub fn parallelism(&self) -> usize {
        self.cap.load(Ordering::Relaxed)
    }

    /// Grow the live parallelism cap under lag pressure, never past the
    /// configured hard ceiling (§4.6).
    pub fn request_more_parallelism(&self) {
        let _ = self
            .cap
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| (c < self.ceiling).then_some(c + 1));
    }

    /// Run every job with no more than `self.parallelism()` concurrent
    /// plugin calls in flight. Takes `self` behind an `Arc` so each job
    /// can run on its own task.
    pub async fn submit_batch(
        self: &Arc<Self>,
        jobs: Vec<ExtractJob>,
        manifest: &PluginManifest,
    ) -> Vec<ExtractOutcome> {
        let limit = self.parallelism().max(1);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(limit));
        let mut join_set = tokio::task::JoinSet::new();

        for job in jobs {
            let pool = Arc::clone(self);
            let manifest = manifest.clone();
            let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore never closed");
            join_set.spawn(async move {
                let outcome = pool.run_job(job, &manifest).await;
                drop(permit);
                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(join_set.len());
        while let Some(result) = join_set.join_next().await {
            outcomes.push(result.unwrap_or_else(|e| ExtractOutcome::Failed(ScrybeError::PluginCrash(format!("worker task panicked: {e}")))));
        }
        outcomes
    }

    /// Run a single job: reuse check, governor admission, bounded retry
    /// with backoff, cancellation via the governor's mode channel, and
    /// persistence of the derived record plus its completion entry
    /// (§4.6 steps 1-6).
    pub async fn run_job(&self, job: ExtractJob, manifest: &PluginManifest) -> ExtractOutcome {
        let derived_id = job.derived_record_id();
        match self.store.get(&derived_id) {
            Ok(Some(_)) => return ExtractOutcome::Reused(derived_id),
            Ok(None) => {}
            Err(e) => return ExtractOutcome::Failed(e),
        }

        if let Err(e) = self.governor.admit_heavy_job() {
            return match e {
                ScrybeError::Preempted(_) | ScrybeError::BudgetExceeded(_) | ScrybeError::DependencyUnavailable(_) => {
                    ExtractOutcome::Canceled
                }
                other => ExtractOutcome::Failed(other),
            };
        }

        let mut mode_rx = self.governor.subscribe();
        let request = PluginRequest {
            request_id: Uuid::new_v4(),
            capability: job.capability.clone(),
            payload: serde_json::json!({
                "frame_id": job.frame_id.as_str(),
                "extractor_id": job.extractor_id,
                "model_version": job.model_version,
                "prompt_fingerprint": job.prompt_fingerprint,
            }),
        };

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if self.governor.should_preempt(false) || mode_changed_to_active(&mut mode_rx) {
                return ExtractOutcome::Canceled;
            }

            match self.plugin_host.call_subprocess(manifest, &self.store, request.clone()).await {
                Ok(response) if response.status == ResponseStatus::Ok => {
                    return self.persist_derived(&job, derived_id, response.payload, response.quality_counters).await;
                }
                Ok(response) => {
                    last_err = Some(ScrybeError::PluginCrash(format!("plugin reported error status: {:?}", response.payload)));
                }
                Err(e) if e.is_fatal() => return ExtractOutcome::Failed(e),
                Err(e) => last_err = Some(e),
            }

            if attempt + 1 < MAX_ATTEMPTS {
                let backoff = RETRY_BACKOFF_BASE_MS * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        ExtractOutcome::Failed(last_err.unwrap_or_else(|| ScrybeError::PluginCrash("exhausted retries".to_string())))
    }

    async fn persist_derived(
        &self,
        job: &ExtractJob,
        derived_id: RecordId,
        payload: serde_json::Value,
        quality_counters: serde_json::Value,
    ) -> ExtractOutcome {
        let mut attributes = match payload {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        attributes.insert("source_frame_id".to_string(), serde_json::json!(job.frame_id.as_str()));
        attributes.insert("extractor_id".to_string(), serde_json::json!(job.extractor_id));
        attributes.insert("model_version".to_string(), serde_json::json!(job.model_version));
        attributes.insert("prompt_fingerprint".to_string(), serde_json::json!(job.prompt_fingerprint));
        attributes.entry("quality").or_insert(quality_counters);
        let attributes = serde_json::Value::Object(attributes);

        if let Err(e) = scrybe_types::schema::validate_payload(job.record_type, &attributes) {
            return ExtractOutcome::Failed(e);
        }
        let content_hash = match scrybe_types::canonical_payload_hash(&attributes) {
            Ok(h) => h,
            Err(e) => return ExtractOutcome::Failed(ScrybeError::SchemaMismatch(format!("hashing derived attributes: {e}"))),
        };

        let record = Record {
            record_id: derived_id.clone(),
            record_type: job.record_type,
            run_id: self.run_id,
            ts_utc: chrono::Utc::now().timestamp_micros(),
            monotonic_ns: 0,
            content_hash,
            producer: Producer::plugin(job.extractor_id.clone(), job.extractor_version.clone()),
            input_refs: vec![job.frame_id.clone()],
            schema_version: 1,
            attributes,
        };

        match self.store.put_new(&record) {
            Ok(_) => ExtractOutcome::Computed(derived_id),
            Err(e) => ExtractOutcome::Failed(e),
        }
    }
}

/// `true` if the governor's mode channel has a pending update that moved
/// the mode to `ActiveCaptureOnly` — the signal a non-user-query job
/// watches for mid-flight preemption (§4.5, §5 "Cancellation").
fn mode_changed_to_active(rx: &mut watch::Receiver<Mode>) -> bool {
    rx.has_changed().unwrap_or(false) && *rx.borrow_and_update() == Mode::ActiveCaptureOnly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ExtractJob;
    use scrybe_config::{GovernorConfig, PluginHostConfig, StoreConfig};
    use scrybe_governor::{Governor, UnavailableResourceTelemetry};
    use scrybe_plugins::manifest::StageScope;
    use scrybe_store::NoCipher;
    use scrybe_types::RecordType;

    async fn open_store(dir: &std::path::Path) -> Arc<EvidenceStore> {
        let config = StoreConfig { data_dir: dir.to_string_lossy().into_owned(), ..Default::default() };
        Arc::new(EvidenceStore::open(&config, &NoCipher).await.unwrap())
    }

    fn job() -> ExtractJob {
        ExtractJob {
            frame_id: RecordId("frame-1".to_string()),
            frame_content_hash: "abc123".to_string(),
            extractor_id: "ocr-stub".to_string(),
            extractor_version: "1.0.0".to_string(),
            model_version: "tesseract-5".to_string(),
            prompt_fingerprint: "none".to_string(),
            config_hash: "cfg1".to_string(),
            capability: "records.write(derived.text.ocr)".to_string(),
            record_type: RecordType::DerivedTextOcr,
        }
    }

    fn manifest() -> PluginManifest {
        PluginManifest {
            plugin_id: "ocr-stub".to_string(),
            version: "1.0.0".to_string(),
            artifact_path: "/bin/true".to_string(),
            content_sha256: "unused-in-tests".to_string(),
            stage_scope: StageScope::Stage2,
            capabilities: vec!["records.write(derived.text.ocr)".to_string()],
            deprecated: false,
        }
    }

    #[tokio::test]
    async fn mode_denying_heavy_work_cancels_before_any_plugin_call() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path()).await;
        let plugin_host =
            Arc::new(PluginHost::new(vec![manifest()], PluginHostConfig::default(), Uuid::new_v4(), tmp.path().join("cache")));
        let governor = Arc::new(Governor::new(GovernorConfig::default(), Box::new(UnavailableResourceTelemetry)));
        let retention = RetentionConfig::default();
        let pool = ExtractWorkerPool::new(store, plugin_host, governor, &retention, Uuid::new_v4(), 1);

        let outcome = pool.run_job(job(), &manifest()).await;
        assert!(matches!(outcome, ExtractOutcome::Canceled));
    }

    #[tokio::test]
    async fn reuses_existing_derived_record_without_admission_check() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path()).await;
        let the_job = job();
        let derived_id = the_job.derived_record_id();
        let attrs = serde_json::json!({
            "source_frame_id": the_job.frame_id.as_str(),
            "extractor_id": the_job.extractor_id,
            "model_version": the_job.model_version,
            "prompt_fingerprint": the_job.prompt_fingerprint,
            "quality": {}
        });
        let record = Record {
            record_id: derived_id.clone(),
            record_type: the_job.record_type,
            run_id: Uuid::new_v4(),
            ts_utc: 0,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::plugin("ocr-stub", "1.0.0"),
            input_refs: vec![the_job.frame_id.clone()],
            schema_version: 1,
            attributes: attrs,
        };
        store.put_new(&record).unwrap();

        let plugin_host =
            Arc::new(PluginHost::new(vec![manifest()], PluginHostConfig::default(), Uuid::new_v4(), tmp.path().join("cache")));
        // Governor denies heavy work, but reuse must short-circuit before the
        // admission check is ever consulted.
        let governor = Arc::new(Governor::new(GovernorConfig::default(), Box::new(UnavailableResourceTelemetry)));
        let retention = RetentionConfig::default();
        let pool = ExtractWorkerPool::new(store, plugin_host, governor, &retention, Uuid::new_v4(), 1);

        let outcome = pool.run_job(the_job, &manifest()).await;
        assert!(matches!(outcome, ExtractOutcome::Reused(id) if id == derived_id));
    }

    #[tokio::test]
    async fn parallelism_cap_respects_hard_ceiling() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path()).await;
        let plugin_host =
            Arc::new(PluginHost::new(vec![manifest()], PluginHostConfig::default(), Uuid::new_v4(), tmp.path().join("cache")));
        let governor = Arc::new(Governor::new(GovernorConfig::default(), Box::new(UnavailableResourceTelemetry)));
        let retention = RetentionConfig { max_parallelism_ceiling: 2, ..Default::default() };
        let pool = ExtractWorkerPool::new(store, plugin_host, governor, &retention, Uuid::new_v4(), 1);

        for _ in 0..10 {
            pool.request_more_parallelism();
        }
        assert_eq!(pool.parallelism(), 2);
    }
}
