//! Retention event stream (§6 "Retention event stream (output)"): an
//! append-only log of `retention.eligible` events that external reapers
//! tail to know which frames' raw blobs are now safe to remove. Kept as
//! a plain JSONL sibling to the evidence store, the same
//! append-then-fsync discipline as `scrybe_store::Ledger` and
//! `scrybe_query::QueryTraceLog` — this is a notification convenience,
//! not the source of truth; the `retention.eligible` record in the store
//! is (§4.9).

use std::path::{Path, PathBuf};

use scrybe_types::{RecordId, ScrybeError};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
struct RetentionEvent<'a> {
    frame_id: &'a str,
    reason_code: &'a str,
    horizon_hint_hours: u64,
}

pub struct RetentionEventStream {
    path: PathBuf,
    writer: Mutex<()>,
}

impl RetentionEventStream {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ScrybeError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScrybeError::RecoveryRequired(format!("creating retention stream dir: {e}")))?;
        }
        Ok(Self { path, writer: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort append. A write failure here is logged rather than
    /// propagated: the `retention.eligible` record already landed
    /// durably in the evidence store before this is ever called, so a
    /// dropped notification does not compromise retention correctness,
    /// only external reapers' timeliness.
    pub async fn emit(&self, frame_id: &RecordId, reason_code: &str, horizon_hint_hours: u64) {
        let event = RetentionEvent { frame_id: frame_id.as_str(), reason_code, horizon_hint_hours };
        if let Err(e) = self.append(&event).await {
            tracing::warn!(error = %e, "failed to append retention event");
        }
    }

    async fn append(&self, event: &RetentionEvent<'_>) -> Result<(), ScrybeError> {
        let _guard = self.writer.lock().await;
        let mut line = serde_json::to_vec(event)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding retention event: {e}")))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("opening retention stream: {e}")))?;
        file.write_all(&line)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("appending retention event: {e}")))?;
        file.sync_data()
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("fsyncing retention event: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_line_delimited_events() {
        let dir = tempfile::tempdir().unwrap();
        let stream = RetentionEventStream::open(dir.path().join("retention_events.jsonl")).await.unwrap();
        stream.emit(&RecordId("frame-1".to_string()), "ok", 144).await;
        stream.emit(&RecordId("frame-2".to_string()), "ok", 144).await;

        let contents = tokio::fs::read_to_string(stream.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
