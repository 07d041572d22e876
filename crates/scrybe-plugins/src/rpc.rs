//! Wire protocol for plugin RPC (§6 "Extractor plugins (bidirectional)"):
//! a length-prefixed binary envelope in both directions, canonical JSON
//! payloads, a hard cap on message size.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use scrybe_types::ScrybeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    pub request_id: Uuid,
    pub capability: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    pub request_id: Uuid,
    pub status: ResponseStatus,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub quality_counters: serde_json::Value,
}

/// Write one length-prefixed JSON frame (4-byte big-endian length + body).
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &impl Serialize,
    max_msg_bytes: usize,
) -> Result<(), ScrybeError> {
    let body = serde_json::to_vec(value).map_err(|e| ScrybeError::SchemaMismatch(format!("encoding frame: {e}")))?;
    if body.len() > max_msg_bytes {
        return Err(ScrybeError::SchemaMismatch(format!(
            "outgoing message of {} bytes exceeds cap of {max_msg_bytes}",
            body.len()
        )));
    }
    let len = body.len() as u32;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| ScrybeError::DependencyUnavailable(format!("writing frame length: {e}")))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| ScrybeError::DependencyUnavailable(format!("writing frame body: {e}")))?;
    writer.flush().await.map_err(|e| ScrybeError::DependencyUnavailable(format!("flushing frame: {e}")))?;
    Ok(())
}

/// Read one length-prefixed JSON frame, rejecting anything over
/// `max_msg_bytes` before allocating a buffer for it.
pub async fn read_frame<R: AsyncRead + Unpin, T: for<'de> Deserialize<'de>>(
    reader: &mut R,
    max_msg_bytes: usize,
) -> Result<T, ScrybeError> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| ScrybeError::DependencyUnavailable(format!("reading frame length: {e}")))?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > max_msg_bytes {
        return Err(ScrybeError::SchemaMismatch(format!(
            "incoming message of {len} bytes exceeds cap of {max_msg_bytes}"
        )));
    }
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| ScrybeError::DependencyUnavailable(format!("reading frame body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| ScrybeError::SchemaMismatch(format!("decoding frame: {e}")))
}
