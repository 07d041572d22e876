//! Plugin host (C4, §4.4): the single entry point callers use to invoke
//! a plugin. Owns the capability broker and the global process pool;
//! enforces the per-call timeout and message cap and records kill
//! reasons to the ledger on timeout or crash.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scrybe_config::PluginHostConfig;
use scrybe_store::EvidenceStore;
use scrybe_types::ScrybeError;
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::broker::CapabilityBroker;
use crate::capability::Capability;
use crate::manifest::PluginManifest;
use crate::process_pool::ProcessPool;
use crate::rpc::{self, PluginRequest, PluginResponse};
use crate::sandbox;
use crate::wasm::WasmPlugin;

pub struct PluginHost {
    broker: CapabilityBroker,
    pool: ProcessPool,
    config: PluginHostConfig,
    run_id: Uuid,
    cache_root: PathBuf,
}

impl PluginHost {
    pub fn new(manifests: Vec<PluginManifest>, config: PluginHostConfig, run_id: Uuid, cache_root: PathBuf) -> Self {
        let pool = ProcessPool::new(config.max_concurrent_processes);
        Self { broker: CapabilityBroker::new(manifests), pool, config, run_id, cache_root }
    }

    fn cache_dir_for(&self, plugin_id: &str) -> PathBuf {
        self.cache_root.join(plugin_id)
    }

    /// Stage-2-scoped manifests this host knows about, for callers (the
    /// daemon's Stage-2 drain loop) that need to discover registered
    /// extractor plugins rather than being handed one.
    pub fn stage2_manifests(&self) -> Vec<PluginManifest> {
        self.broker.manifests_for_stage(crate::manifest::StageScope::Stage2).into_iter().cloned().collect()
    }

    /// Invoke a subprocess-backed plugin, enforcing capability checks,
    /// the global process cap, and a hard per-call timeout (§4.4, §5
    /// "Suspension points": only the Stage-2 worker pool and the plugin
    /// host may block on plugin RPC).
    pub async fn call_subprocess(
        &self,
        manifest: &PluginManifest,
        store: &EvidenceStore,
        request: PluginRequest,
    ) -> Result<PluginResponse, ScrybeError> {
        let requested = Capability::parse(&request.capability)?;
        if let Err(e) = self.broker.check(&manifest.plugin_id, &requested) {
            let denial = scrybe_audit::capability_denial(
                self.run_id,
                0,
                &request.request_id.to_string(),
                &manifest.plugin_id,
                &requested.tag,
            );
            store.append_ledger(denial).await?;
            return Err(e);
        }

        let _permit = self.pool.acquire().await?;
        let cache_dir = self.cache_dir_for(&manifest.plugin_id);
        sandbox::prepare_cache_dir(&cache_dir)?;

        let artifact = Path::new(&manifest.artifact_path);
        let mut cmd = sandbox::sandboxed_command(artifact, &cache_dir, &Default::default());
        let mut child = cmd
            .spawn()
            .map_err(|e| ScrybeError::PluginCrash(format!("spawning plugin `{}`: {e}", manifest.plugin_id)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScrybeError::PluginCrash("plugin child has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScrybeError::PluginCrash("plugin child has no stdout".to_string()))?;
        let mut reader = BufReader::new(stdout);

        let max_msg_bytes = self.config.max_msg_bytes;
        let call = async {
            rpc::write_frame(&mut stdin, &request, max_msg_bytes).await?;
            stdin.shutdown().await.ok();
            rpc::read_frame::<_, PluginResponse>(&mut reader, max_msg_bytes).await
        };

        let timeout = Duration::from_secs_f64(self.config.rpc_timeout_s);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => {
                let _ = child.wait().await;
                Ok(response)
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                let term = scrybe_audit::termination(
                    self.run_id,
                    0,
                    &request.request_id.to_string(),
                    &manifest.plugin_id,
                    &format!("rpc error: {e}"),
                );
                store.append_ledger(term).await?;
                Err(e)
            }
            Err(_) => {
                let _ = child.kill().await;
                let term = scrybe_audit::termination(
                    self.run_id,
                    0,
                    &request.request_id.to_string(),
                    &manifest.plugin_id,
                    "rpc_timeout",
                );
                store.append_ledger(term).await?;
                Err(ScrybeError::PluginTimeout(timeout))
            }
        }
    }

    /// Invoke a WASM-backed plugin. Capability-checked and cap-enforced
    /// the same way as `call_subprocess`; runs on a blocking thread since
    /// Wasmtime's sync API must not run on an async executor thread.
    pub async fn call_wasm(
        &self,
        manifest: &PluginManifest,
        store: &EvidenceStore,
        plugin: WasmPlugin,
        request: PluginRequest,
    ) -> Result<PluginResponse, ScrybeError> {
        let requested = Capability::parse(&request.capability)?;
        if let Err(e) = self.broker.check(&manifest.plugin_id, &requested) {
            let denial = scrybe_audit::capability_denial(
                self.run_id,
                0,
                &request.request_id.to_string(),
                &manifest.plugin_id,
                &requested.tag,
            );
            store.append_ledger(denial).await?;
            return Err(e);
        }

        let _permit = self.pool.acquire().await?;
        let max_msg_bytes = self.config.max_msg_bytes;
        let timeout = Duration::from_secs_f64(self.config.rpc_timeout_s);

        let call = tokio::task::spawn_blocking(move || plugin.call_sync(&request, max_msg_bytes));
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ScrybeError::PluginCrash(format!("wasm task panicked: {join_err}"))),
            Err(_) => {
                let term = scrybe_audit::termination(self.run_id, 0, "wasm-call", &manifest.plugin_id, "rpc_timeout");
                store.append_ledger(term).await?;
                Err(ScrybeError::PluginTimeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::StageScope;
    use scrybe_config::StoreConfig;
    use scrybe_store::NoCipher;

    fn echo_manifest(artifact_path: &str) -> PluginManifest {
        PluginManifest {
            plugin_id: "echo-stub".to_string(),
            version: "1.0.0".to_string(),
            artifact_path: artifact_path.to_string(),
            content_sha256: "unused-in-tests".to_string(),
            stage_scope: StageScope::Stage2,
            capabilities: vec!["records.write(derived.text.echo)".to_string()],
            deprecated: false,
        }
    }

    async fn open_store(dir: &std::path::Path) -> EvidenceStore {
        let config = StoreConfig { data_dir: dir.to_string_lossy().into_owned(), ..Default::default() };
        EvidenceStore::open(&config, &NoCipher).await.unwrap()
    }

    fn sample_request(capability: &str) -> PluginRequest {
        PluginRequest { request_id: Uuid::new_v4(), capability: capability.to_string(), payload: serde_json::json!({}) }
    }

    #[tokio::test]
    async fn denied_capability_never_spawns_a_process() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path()).await;
        let host = PluginHost::new(
            vec![echo_manifest("/bin/cat")],
            PluginHostConfig::default(),
            Uuid::new_v4(),
            tmp.path().join("cache"),
        );
        let manifest = host.broker.manifest("echo-stub").unwrap().clone();
        let err = host
            .call_subprocess(&manifest, &store, sample_request("media.read(source=stage1)"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "capability_denied");
    }

    #[tokio::test]
    async fn subprocess_call_round_trips_through_a_stub_script() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path()).await;

        // A stub "plugin": drains whatever frame it's sent on stdin and
        // writes a fixed length-prefixed PluginResponse frame to stdout.
        // The response body's length is constant and computed up front
        // so the 4-byte big-endian prefix can be written literally,
        // sidestepping any binary-arithmetic gymnastics in /bin/sh.
        // Exercised with /bin/sh rather than a compiled binary so the
        // test needs no build step of its own.
        let script_path = tmp.path().join("echo-plugin.sh");
        std::fs::write(
            &script_path,
            "#!/bin/sh\ncat >/dev/null\nprintf '\\x00\\x00\\x00\\x68'\nprintf '%s' '{\"request_id\":\"00000000-0000-0000-0000-000000000000\",\"status\":\"ok\",\"payload\":{},\"quality_counters\":null}'\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let host = PluginHost::new(
            vec![echo_manifest(script_path.to_str().unwrap())],
            PluginHostConfig { rpc_timeout_s: 5.0, ..Default::default() },
            Uuid::new_v4(),
            tmp.path().join("cache"),
        );
        let manifest = host.broker.manifest("echo-stub").unwrap().clone();
        let response = host
            .call_subprocess(&manifest, &store, sample_request("records.write(derived.text.echo)"))
            .await
            .unwrap();
        assert_eq!(response.status, ResponseStatus::Ok);
    }

    #[tokio::test]
    async fn timeout_kills_a_hanging_plugin_and_audits_termination() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path()).await;
        let host = PluginHost::new(
            vec![echo_manifest("/bin/sleep")],
            PluginHostConfig { rpc_timeout_s: 0.05, ..Default::default() },
            Uuid::new_v4(),
            tmp.path().join("cache"),
        );
        let mut manifest = host.broker.manifest("echo-stub").unwrap().clone();

        let script_path = tmp.path().join("hang.sh");
        std::fs::write(&script_path, "#!/bin/sh\nsleep 5\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        manifest.artifact_path = script_path.to_str().unwrap().to_string();

        let err = host
            .call_subprocess(&manifest, &store, sample_request("records.write(derived.text.echo)"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "plugin_timeout");
    }
}
