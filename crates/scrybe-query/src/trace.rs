//! Append-only query-trace log (§4.8 step 5). Modeled on
//! `scrybe_store::Ledger`'s append-then-fsync discipline, but kept as
//! its own JSONL artifact rather than a ledger `Record` — a query trace
//! is an observability side-channel, not part of the evidence graph the
//! closed `RecordType` set describes.

use std::path::{Path, PathBuf};

use scrybe_types::ScrybeError;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTraceEntry {
    pub query_hash: String,
    pub mode_used: String,
    pub plugins_in_path: Vec<String>,
    pub citation_ids: Vec<String>,
    pub confidence_band: String,
    pub state: String,
    pub latency_ms: u64,
}

pub struct QueryTraceLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl QueryTraceLog {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ScrybeError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScrybeError::RecoveryRequired(format!("creating query trace log dir: {e}")))?;
        }
        Ok(Self { path, writer: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &QueryTraceEntry) -> Result<(), ScrybeError> {
        let _guard = self.writer.lock().await;
        let mut line = serde_json::to_vec(entry)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding query trace entry: {e}")))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("opening query trace log: {e}")))?;
        file.write_all(&line).await.map_err(|e| ScrybeError::RecoveryRequired(format!("appending trace entry: {e}")))?;
        file.sync_data().await.map_err(|e| ScrybeError::RecoveryRequired(format!("fsyncing trace entry: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_are_durable_and_line_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryTraceLog::open(dir.path().join("query_trace.jsonl")).await.unwrap();

        let entry = QueryTraceEntry {
            query_hash: "abc".to_string(),
            mode_used: "USER_QUERY".to_string(),
            plugins_in_path: vec![],
            citation_ids: vec!["rec-1:0:0".to_string()],
            confidence_band: "high".to_string(),
            state: "ok".to_string(),
            latency_ms: 12,
        };
        log.append(&entry).await.unwrap();
        log.append(&entry).await.unwrap();

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
