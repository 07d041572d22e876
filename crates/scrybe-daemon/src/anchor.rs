//! Ledger chain anchoring (SPEC_FULL "Ledger chain anchoring"
//! supplement, §3 I5 "chain root is periodically anchored"): a
//! background task that snapshots the ledger's current root hash every
//! `anchor_interval_s` so a full `verify_chain` audit has cheap resume
//! points instead of always starting from sequence zero.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use scrybe_store::EvidenceStore;
use scrybe_types::ScrybeError;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

#[derive(Debug, Clone, Serialize)]
struct AnchorEntry {
    ledger_len: u64,
    root_hash: String,
}

/// Append one anchor snapshot to `path` (create-or-append JSONL, fsync'd
/// per write — same discipline as the ledger and query-trace log).
async fn write_anchor(path: &Path, entry: &AnchorEntry) -> Result<(), ScrybeError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("creating anchor table dir: {e}")))?;
    }
    let mut line =
        serde_json::to_vec(entry).map_err(|e| ScrybeError::SchemaMismatch(format!("encoding anchor entry: {e}")))?;
    line.push(b'\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ScrybeError::RecoveryRequired(format!("opening anchor table: {e}")))?;
    file.write_all(&line).await.map_err(|e| ScrybeError::RecoveryRequired(format!("writing anchor entry: {e}")))?;
    file.sync_data().await.map_err(|e| ScrybeError::RecoveryRequired(format!("fsyncing anchor entry: {e}")))?;
    Ok(())
}

/// Runs until `shutdown` fires, snapshotting the ledger root every
/// `interval`. A failed snapshot is logged and retried on the next tick
/// rather than treated as fatal — the anchor table is an optimization,
/// not the chain itself.
pub async fn run_anchor_loop(
    store: Arc<EvidenceStore>,
    anchor_path: PathBuf,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                let entry = AnchorEntry {
                    ledger_len: store.ledger.len().await,
                    root_hash: store.ledger.current_root().await,
                };
                if let Err(e) = write_anchor(&anchor_path, &entry).await {
                    tracing::warn!(error = %e, "ledger anchor snapshot failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_audit::marker_emit;
    use scrybe_config::StoreConfig;
    use scrybe_store::NoCipher;
    use scrybe_types::RecordId;
    use uuid::Uuid;

    #[tokio::test]
    async fn anchor_loop_snapshots_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig { data_dir: dir.path().join("data").to_string_lossy().to_string(), ..Default::default() };
        let store = Arc::new(EvidenceStore::open(&config, &NoCipher).await.unwrap());
        store
            .append_ledger(marker_emit(Uuid::nil(), 0, "0", "retention.eligible", &RecordId("frame-1".to_string())))
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let anchor_path = dir.path().join("anchors.jsonl");
        let handle = tokio::spawn(run_anchor_loop(store.clone(), anchor_path.clone(), Duration::from_millis(5), rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let contents = tokio::fs::read_to_string(&anchor_path).await.unwrap();
        assert!(contents.lines().count() >= 1);
    }
}
