//! C1 — Evidence Store & Ledger. An append-only mapping from
//! `record_id → record` plus a content-addressed blob directory and a
//! hash-chained audit ledger, per §4.1.

pub mod blob;
pub mod cipher;
pub mod ledger;
pub mod records;
pub mod recovery;

use std::path::Path;

use scrybe_config::StoreConfig;
use scrybe_types::{Record, RecordId, RecordType, ScrybeError};

pub use blob::BlobStore;
pub use cipher::{MetadataCipher, NoCipher};
pub use ledger::{ChainVerifyResult, Ledger, LedgerEntry};
pub use records::{PutOutcome, RecordStore};
pub use recovery::RecoveryReport;

/// Facade over the three storage primitives (§4.1), wired together the
/// way a component actually uses them: write frame/derived records
/// through `put_new`, put image bytes through `put_blob`, and log
/// privileged actions through `append_ledger`.
pub struct EvidenceStore {
    pub records: RecordStore,
    pub blobs: BlobStore,
    pub ledger: Ledger,
}

impl EvidenceStore {
    pub async fn open(config: &StoreConfig, cipher: &dyn MetadataCipher) -> Result<Self, ScrybeError> {
        cipher::enforce_boot_policy(config.require_encryption, cipher)?;

        let root = Path::new(&config.data_dir);
        let records = RecordStore::open(root.join("metadata.redb"))?;
        let blobs = BlobStore::open(root.join("blobs"))?;
        let ledger = Ledger::open(root.join("ledger.jsonl")).await?;

        recovery::recover(&blobs, &ledger).await?;

        Ok(Self { records, blobs, ledger })
    }

    pub fn put_new(&self, record: &Record) -> Result<PutOutcome, ScrybeError> {
        self.records.put_new(record)
    }

    pub fn get(&self, record_id: &RecordId) -> Result<Option<Record>, ScrybeError> {
        self.records.get(record_id)
    }

    pub fn put_batch(&self, records: &[Record]) -> Result<Vec<PutOutcome>, ScrybeError> {
        self.records.put_batch(records)
    }

    pub fn scan(&self, record_type: RecordType, time_range: std::ops::Range<i64>) -> Result<Vec<Record>, ScrybeError> {
        self.records.scan(record_type, time_range)
    }

    pub fn put_blob(&self, bytes: &[u8]) -> Result<String, ScrybeError> {
        self.blobs.put_blob(bytes)
    }

    /// Every `audit.*` record goes to the ledger only (§3), never to the
    /// queryable record store.
    pub async fn append_ledger(&self, record: Record) -> Result<String, ScrybeError> {
        debug_assert!(record.record_type.is_ledger_only(), "only audit.* records belong in the ledger");
        self.ledger.append_ledger(record).await
    }

    pub async fn verify_chain(&self, range: std::ops::Range<u64>) -> Result<ChainVerifyResult, ScrybeError> {
        self.ledger.verify_chain(range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_types::Producer;
    use uuid::Uuid;

    #[tokio::test]
    async fn open_then_roundtrip_record_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig { data_dir: dir.path().to_string_lossy().to_string(), ..Default::default() };
        let store = EvidenceStore::open(&config, &NoCipher).await.unwrap();

        let blob_id = store.put_blob(b"fake-png-bytes").unwrap();
        let attrs = serde_json::json!({
            "image_sha256": blob_id, "width": 1, "height": 1,
            "segment_id": "seg-a", "frame_index": 0,
            "thumb_sha256": "xyz", "thumb_algo": "64x64"
        });
        let record = Record {
            record_id: scrybe_types::derive_record_id(RecordType::EvidenceCaptureFrame, &[], "seg-a:0"),
            record_type: RecordType::EvidenceCaptureFrame,
            run_id: Uuid::nil(),
            ts_utc: 42,
            monotonic_ns: 0,
            content_hash: scrybe_types::canonical_payload_hash(&attrs).unwrap(),
            producer: Producer::core(),
            input_refs: vec![],
            schema_version: 1,
            attributes: attrs,
        };
        assert_eq!(store.put_new(&record).unwrap(), PutOutcome::Ok);
        assert!(store.get(&record.record_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn encryption_required_with_failing_cipher_fails_boot_closed() {
        struct Locked;
        impl MetadataCipher for Locked {
            fn unlock(&self) -> Result<(), ScrybeError> {
                Err(ScrybeError::RecoveryRequired("no key".into()))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().to_string_lossy().to_string(),
            require_encryption: true,
            ..Default::default()
        };
        assert!(EvidenceStore::open(&config, &Locked).await.is_err());
    }
}
