//! Wires the evidence store (C1), plugin host (C4), governor (C5), and
//! Stage-2 worker pool (C6) into one shared handle the daemon's tasks
//! borrow from (§5 "independent tasks coordinating through ... a shared
//! ... context").

use std::path::PathBuf;
use std::sync::Arc;

use scrybe_capture::{ActivitySignal, CaptureSource, FrameBuffer, NaiveDownsampleThumbnailer, UnavailableActivitySignal};
use scrybe_config::AppConfig;
use scrybe_extract::ExtractWorkerPool;
use scrybe_governor::{Governor, UnavailableResourceTelemetry};
use scrybe_plugins::{DigestOnlyVerifier, PluginHost, PluginManifest};
use scrybe_store::{EvidenceStore, NoCipher};
use scrybe_types::ScrybeError;
use uuid::Uuid;

/// No real OS screen-grabber ships in this workspace (§1 Non-goals list
/// "operating-system screen grabbing primitives" as an external
/// collaborator); this stand-in always reports unavailable, the same
/// fail pattern as `UnavailableActivitySignal` and
/// `UnavailableResourceTelemetry`, until a host process injects a real
/// `CaptureSource`.
pub struct UnavailableCaptureSource;

impl CaptureSource for UnavailableCaptureSource {
    fn grab(&self) -> Result<FrameBuffer, ScrybeError> {
        Err(ScrybeError::DependencyUnavailable("no screen capture source configured".to_string()))
    }
}

/// Everything the daemon's background tasks and the query socket share.
/// One instance per daemon process.
pub struct RuntimeContext {
    pub run_id: Uuid,
    pub config: AppConfig,
    pub store: Arc<EvidenceStore>,
    pub governor: Arc<Governor>,
    pub plugin_host: Arc<PluginHost>,
    pub extract_pool: Arc<ExtractWorkerPool>,
    pub activity_signal: Arc<dyn ActivitySignal>,
    pub capture_source: Arc<dyn CaptureSource>,
    pub thumbnailer: Arc<NaiveDownsampleThumbnailer>,
}

impl RuntimeContext {
    /// Boot sequence: audit Stage-1's own dependency list (§4.3 static
    /// half of the OCR/VLM isolation guarantee), open the evidence store
    /// (which runs the startup recovery scan internally, §4.1), load the
    /// signed plugin lock if one is present (§4.4), then build the
    /// governor and Stage-2 worker pool around it.
    pub async fn bootstrap(config: AppConfig, data_root: PathBuf) -> Result<Self, ScrybeError> {
        scrybe_ingest::dependency_audit::audit_self()?;

        let run_id = Uuid::new_v4();
        let store = Arc::new(EvidenceStore::open(&config.store, &NoCipher).await?);

        let governor = Arc::new(Governor::new(config.governor.clone(), Box::new(UnavailableResourceTelemetry)));

        let lock_path = data_root.join("plugins.lock.json");
        let manifests: Vec<PluginManifest> = if lock_path.exists() {
            scrybe_plugins::load_verified(&lock_path, &DigestOnlyVerifier)?
        } else {
            tracing::warn!(path = %lock_path.display(), "no plugin lock found; starting with zero extractor plugins");
            Vec::new()
        };

        let plugin_host = Arc::new(PluginHost::new(
            manifests,
            config.plugin_host.clone(),
            run_id,
            data_root.join("plugin-cache"),
        ));

        let extract_pool = Arc::new(ExtractWorkerPool::new(
            store.clone(),
            plugin_host.clone(),
            governor.clone(),
            &config.retention,
            run_id,
            config.plugin_host.max_concurrent_processes,
        ));

        Ok(Self {
            run_id,
            config,
            store,
            governor,
            plugin_host,
            extract_pool,
            activity_signal: Arc::new(UnavailableActivitySignal),
            capture_source: Arc::new(UnavailableCaptureSource),
            thumbnailer: Arc::new(NaiveDownsampleThumbnailer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_config::StoreConfig;

    #[tokio::test]
    async fn bootstrap_with_no_plugin_lock_starts_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.store = StoreConfig { data_dir: dir.path().join("data").to_string_lossy().to_string(), ..Default::default() };

        let ctx = RuntimeContext::bootstrap(config, dir.path().to_path_buf()).await.unwrap();
        assert_eq!(ctx.extract_pool.parallelism(), ctx.config.plugin_host.max_concurrent_processes.min(ctx.config.retention.max_parallelism_ceiling));
    }
}
