//! Append-only, hash-chained ledger of privileged actions (§3 I5, §7).
//!
//! Modeled on `aigent-memory`'s `MemoryEventLog`: JSONL on disk, every
//! append fsync'd before returning, atomic temp-then-rename for the rare
//! full rewrite (only used by the anchor-compaction path, never by normal
//! appends — appends are pure additions). Writes are serialized by a
//! single in-process writer lock (§4.1 "single-writer discipline").

use std::path::{Path, PathBuf};

use scrybe_types::{sha256_hex, Record, ScrybeError};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub seq: u64,
    pub record: Record,
    pub prev_hash: String,
}

impl LedgerEntry {
    /// Canonical payload used both as the chain's "this entry" hash and
    /// as the thing the next entry's `prev_hash` must equal (§3 I5).
    pub fn canonical_payload(&self) -> Vec<u8> {
        // Exclude nothing: the whole entry (including prev_hash) is what
        // gets hashed into the next link, matching "prev_hash ==
        // sha256(entry[n-1].canonical_payload)".
        serde_json::to_vec(self).expect("LedgerEntry always serializes")
    }

    pub fn hash(&self) -> String {
        sha256_hex(&self.canonical_payload())
    }
}

#[derive(Debug)]
pub enum ChainVerifyResult {
    Ok,
    Break { at_seq: u64 },
}

struct WriterState {
    last_hash: String,
    next_seq: u64,
}

pub struct Ledger {
    path: PathBuf,
    writer: Mutex<WriterState>,
}

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

impl Ledger {
    /// Open (creating if absent) and recompute the writer's resume point
    /// by replaying the existing file. This is the ledger half of the
    /// startup recovery scan (§4.1).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ScrybeError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScrybeError::RecoveryRequired(format!("creating ledger dir: {e}")))?;
        }

        let entries = Self::load_entries(&path).await?;
        let (last_hash, next_seq) = match entries.last() {
            Some(last) => (last.hash(), last.seq + 1),
            None => (GENESIS_HASH.to_string(), 0),
        };

        Ok(Self {
            path,
            writer: Mutex::new(WriterState { last_hash, next_seq }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_entries(path: &Path) -> Result<Vec<LedgerEntry>, ScrybeError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("reading ledger: {e}")))?;
        let mut entries = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(e) => entries.push(e),
                Err(err) => {
                    tracing::warn!(line = line_no + 1, error = %err, "ledger: skipping corrupt line");
                }
            }
        }
        Ok(entries)
    }

    /// Append one record to the chain. Returns the new entry's own hash
    /// (the value the *next* append will use as `prev_hash`).
    pub async fn append_ledger(&self, record: Record) -> Result<String, ScrybeError> {
        let mut state = self.writer.lock().await;

        let entry = LedgerEntry {
            entry_id: Uuid::new_v4(),
            seq: state.next_seq,
            record,
            prev_hash: state.last_hash.clone(),
        };
        let entry_hash = entry.hash();

        let line = serde_json::to_string(&entry)
            .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding ledger entry: {e}")))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("opening ledger for append: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(format!("writing ledger entry: {e}")))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        file.flush().await.map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        file.sync_all().await.map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;

        state.last_hash = entry_hash.clone();
        state.next_seq += 1;
        Ok(entry_hash)
    }

    /// Verify the hash chain across `range` (by sequence number). Can be
    /// called on any prefix of the log, per §8 "Ledger hash chain
    /// verifies end-to-end across any prefix".
    pub async fn verify_chain(&self, range: std::ops::Range<u64>) -> Result<ChainVerifyResult, ScrybeError> {
        let entries = Self::load_entries(&self.path).await?;
        let mut expected_prev = if range.start == 0 {
            GENESIS_HASH.to_string()
        } else {
            match entries.iter().find(|e| e.seq == range.start - 1) {
                Some(e) => e.hash(),
                None => return Ok(ChainVerifyResult::Break { at_seq: range.start }),
            }
        };

        for entry in entries.iter().filter(|e| range.contains(&e.seq)) {
            if entry.prev_hash != expected_prev {
                return Ok(ChainVerifyResult::Break { at_seq: entry.seq });
            }
            expected_prev = entry.hash();
        }
        Ok(ChainVerifyResult::Ok)
    }

    /// Current chain root — the hash of the most recently appended entry,
    /// or the genesis hash if the ledger is empty. Snapshotted
    /// periodically by the daemon into an anchor table (SPEC_FULL "Ledger
    /// chain anchoring" supplement) so `verify_chain` has cheap resume
    /// points.
    pub async fn current_root(&self) -> String {
        self.writer.lock().await.last_hash.clone()
    }

    pub async fn len(&self) -> u64 {
        self.writer.lock().await.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_types::{Producer, RecordId, RecordType};

    fn audit_record(ordinal: u64) -> Record {
        let attrs = serde_json::json!({"reason": format!("test-{ordinal}")});
        Record {
            record_id: RecordId(format!("r{ordinal}")),
            record_type: RecordType::AuditMarkerEmit,
            run_id: Uuid::nil(),
            ts_utc: ordinal as i64,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![],
            schema_version: 1,
            attributes: attrs,
        }
    }

    #[tokio::test]
    async fn chain_verifies_after_several_appends() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("ledger.jsonl")).await.unwrap();
        for i in 0..5 {
            ledger.append_ledger(audit_record(i)).await.unwrap();
        }
        let result = ledger.verify_chain(0..5).await.unwrap();
        assert!(matches!(result, ChainVerifyResult::Ok));
    }

    #[tokio::test]
    async fn detects_broken_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = Ledger::open(&path).await.unwrap();
        for i in 0..3 {
            ledger.append_ledger(audit_record(i)).await.unwrap();
        }
        // Corrupt: rewrite the middle line's prev_hash.
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let mut lines: Vec<String> = raw.lines().map(String::from).collect();
        let mut entry: LedgerEntry = serde_json::from_str(&lines[1]).unwrap();
        entry.prev_hash = "tampered".to_string();
        lines[1] = serde_json::to_string(&entry).unwrap();
        tokio::fs::write(&path, lines.join("\n") + "\n").await.unwrap();

        let ledger2 = Ledger::open(&path).await.unwrap();
        let result = ledger2.verify_chain(0..3).await.unwrap();
        assert!(matches!(result, ChainVerifyResult::Break { at_seq: 1 }));
    }

    #[tokio::test]
    async fn reopening_resumes_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = Ledger::open(&path).await.unwrap();
            ledger.append_ledger(audit_record(0)).await.unwrap();
        }
        let ledger2 = Ledger::open(&path).await.unwrap();
        ledger2.append_ledger(audit_record(1)).await.unwrap();
        let result = ledger2.verify_chain(0..2).await.unwrap();
        assert!(matches!(result, ChainVerifyResult::Ok));
    }
}
