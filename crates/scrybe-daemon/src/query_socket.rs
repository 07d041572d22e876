//! Loopback query socket (§6 "Query API (local, loopback-only)"). A
//! Unix domain socket accepting one JSON request per line and replying
//! with one JSON response per line, the same `UnixListener` accept-loop
//! shape as the teacher's `server::run_unified_daemon`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scrybe_query::QueryOrchestrator;
use scrybe_types::ScrybeError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

/// `{query_text, options}` per §6. `options` is accepted but unused —
/// the spec names no option fields, so this only exists so a forward
/// compatible client can send an empty object without the daemon
/// rejecting the request.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryApiRequest {
    pub query_text: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// `{state, answer?, citations[], plugins_in_path[], query_hash}` per
/// §6. `schedule_extract` and raw-media-access flags are never emitted
/// here because [`scrybe_query::QueryOrchestrator`] never touches either
/// (enforced by its own `ContractCounters`).
#[derive(Debug, Clone, Serialize)]
pub struct QueryApiResponse {
    pub state: &'static str,
    pub answer: Option<String>,
    pub citations: Vec<QueryApiCitation>,
    pub plugins_in_path: Vec<String>,
    pub query_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryApiCitation {
    pub record_id: String,
    pub span_id: String,
    pub record_type: &'static str,
}

fn bind(socket_path: &Path) -> Result<UnixListener, ScrybeError> {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("creating socket dir: {e}")))?;
    }
    UnixListener::bind(socket_path)
        .map_err(|e| ScrybeError::RecoveryRequired(format!("binding query socket {}: {e}", socket_path.display())))
}

/// Accept loop: one task per connection, each connection handling
/// exactly one request-response exchange per line until the client
/// closes its write half.
pub async fn run_query_socket(
    orchestrator: Arc<QueryOrchestrator>,
    socket_path: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ScrybeError> {
    let listener = bind(&socket_path)?;
    tracing::info!(path = %socket_path.display(), "query socket listening");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, _addr) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "query socket accept failed");
                        continue;
                    }
                };
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, orchestrator).await {
                        tracing::warn!(error = %e, "query connection handler failed");
                    }
                });
            }
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

async fn handle_connection(stream: UnixStream, orchestrator: Arc<QueryOrchestrator>) -> Result<(), ScrybeError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ScrybeError::RecoveryRequired(format!("reading query socket: {e}")))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<QueryApiRequest>(&line) {
            Ok(request) => {
                let now_utc = chrono::Utc::now().timestamp_micros();
                let answer = orchestrator.answer(&request.query_text, now_utc).await;
                QueryApiResponse {
                    state: answer.state.as_str(),
                    answer: answer.answer,
                    citations: answer
                        .citations
                        .into_iter()
                        .map(|c| QueryApiCitation { record_id: c.record_id, span_id: c.span_id, record_type: c.record_type })
                        .collect(),
                    plugins_in_path: answer.plugins_in_path,
                    query_hash: answer.query_hash,
                }
            }
            Err(e) => QueryApiResponse {
                state: "NEEDS_CLARIFICATION",
                answer: Some(format!("malformed request: {e}")),
                citations: Vec::new(),
                plugins_in_path: Vec::new(),
                query_hash: String::new(),
            },
        };

        let mut encoded = serde_json::to_vec(&response)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding query response: {e}")))?;
        encoded.push(b'\n');
        write_half
            .write_all(&encoded)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("writing query response: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_config::QueryConfig;
    use scrybe_config::StoreConfig;
    use scrybe_query::QueryTraceLog;
    use scrybe_store::{EvidenceStore, NoCipher};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn unrecognized_query_round_trips_over_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let store_config = StoreConfig { data_dir: dir.path().join("data").to_string_lossy().to_string(), ..Default::default() };
        let store = Arc::new(EvidenceStore::open(&store_config, &NoCipher).await.unwrap());
        let trace_log = Arc::new(QueryTraceLog::open(dir.path().join("trace.jsonl")).await.unwrap());
        let orchestrator = Arc::new(QueryOrchestrator::new(store, QueryConfig::default(), trace_log));

        let socket_path = dir.path().join("query.sock");
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_query_socket(orchestrator, socket_path.clone(), rx));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        client.write_all(b"{\"query_text\": \"purple elephant migration\"}\n").await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let response: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(response["state"], "NEEDS_CLARIFICATION");

        tx.send(true).unwrap();
        drop(client);
        let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;
    }
}
