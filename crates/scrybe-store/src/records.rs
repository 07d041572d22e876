//! The record store: `record_id → Record`, redb-backed, with a secondary
//! time index per `record_type` so [`RecordStore::scan`] never needs a
//! full table scan (§4.1).

use std::ops::Range;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};
use scrybe_types::{Record, RecordId, RecordType, ScrybeError};

const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
/// Key: `"{record_type}\0{ts_utc:020}\0{record_id}"` → value: record_id.
/// redb iterates keys in byte order, so a prefix range over `record_type`
/// yields that type's records ordered by `(ts_utc, record_id)` (§4.1
/// "Ordering: scans return records in `(ts_utc, record_id)` order").
const TIME_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("time_index");

/// Outcome of [`RecordStore::put_new`] (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Ok,
    DuplicateOk,
}

pub struct RecordStore {
    db: Database,
    path: PathBuf,
}

fn time_index_key(record_type: RecordType, ts_utc: i64, record_id: &str) -> String {
    // Bias ts_utc into an unsigned range so lexicographic string order
    // matches numeric order even if a timestamp were ever negative.
    let biased = (ts_utc as i128 - i64::MIN as i128) as u128;
    format!("{}\u{0}{biased:039}\u{0}{record_id}", record_type.as_str())
}

fn time_index_prefix(record_type: RecordType) -> String {
    format!("{}\u{0}", record_type.as_str())
}

impl RecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScrybeError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("creating store dir: {e}")))?;
        }
        let db = Database::create(&path)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("opening record store at {}: {e}", path.display())))?;
        {
            let tx = db
                .begin_write()
                .map_err(|e| ScrybeError::RecoveryRequired(format!("begin_write: {e}")))?;
            tx.open_table(RECORDS_TABLE)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("open_table records: {e}")))?;
            tx.open_table(TIME_INDEX_TABLE)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("open_table time_index: {e}")))?;
            tx.commit().map_err(|e| ScrybeError::RecoveryRequired(format!("commit: {e}")))?;
        }
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent on byte-identical repeat; fails closed on conflicting
    /// content (§3 I1, §4.1).
    pub fn put_new(&self, record: &Record) -> Result<PutOutcome, ScrybeError> {
        scrybe_types::schema::validate_payload(record.record_type, &record.attributes)?;
        if !record.attributes_hash_matches() {
            return Err(ScrybeError::IntegrityFault(format!(
                "record {} content_hash does not match its own attributes",
                record.record_id
            )));
        }

        let key = record.record_id.as_str().to_string();
        let bytes = bincode::serde::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding record: {e}")))?;

        let tx = self
            .db
            .begin_write()
            .map_err(|e| ScrybeError::RecoveryRequired(format!("begin_write: {e}")))?;
        let outcome;
        {
            let mut tbl = tx
                .open_table(RECORDS_TABLE)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("open_table: {e}")))?;
            if let Some(existing) = tbl.get(key.as_str()).map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))? {
                let existing: Record = bincode::serde::decode_from_slice(existing.value(), bincode::config::standard())
                    .map_err(|e| ScrybeError::IntegrityFault(format!("decoding existing record: {e}")))?
                    .0;
                if existing.content_hash == record.content_hash {
                    return Ok(PutOutcome::DuplicateOk);
                }
                return Err(ScrybeError::IntegrityFault(format!(
                    "record {} already exists with a different content_hash",
                    record.record_id
                )));
            }
            tbl.insert(key.as_str(), bytes.as_slice())
                .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;

            let mut time_tbl = tx
                .open_table(TIME_INDEX_TABLE)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("open_table: {e}")))?;
            let index_key = time_index_key(record.record_type, record.ts_utc, record.record_id.as_str());
            time_tbl
                .insert(index_key.as_str(), record.record_id.as_str())
                .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;

            outcome = PutOutcome::Ok;
        }
        tx.commit().map_err(|e| ScrybeError::RecoveryRequired(format!("commit: {e}")))?;
        Ok(outcome)
    }

    /// Write several records as one atomic transaction: either all land
    /// and become visible together, or the whole batch fails (§5
    /// "Ordering guarantees" — a frame's record writes must be committed
    /// before its completion marker is visible; the completion marker and
    /// retention marker are written in the same transactional batch).
    /// Per-record duplicate/conflict semantics match `put_new`.
    pub fn put_batch(&self, records: &[Record]) -> Result<Vec<PutOutcome>, ScrybeError> {
        for record in records {
            scrybe_types::schema::validate_payload(record.record_type, &record.attributes)?;
            if !record.attributes_hash_matches() {
                return Err(ScrybeError::IntegrityFault(format!(
                    "record {} content_hash does not match its own attributes",
                    record.record_id
                )));
            }
        }

        let tx = self
            .db
            .begin_write()
            .map_err(|e| ScrybeError::RecoveryRequired(format!("begin_write: {e}")))?;
        let mut outcomes = Vec::with_capacity(records.len());
        {
            let mut tbl = tx
                .open_table(RECORDS_TABLE)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("open_table: {e}")))?;
            let mut time_tbl = tx
                .open_table(TIME_INDEX_TABLE)
                .map_err(|e| ScrybeError::RecoveryRequired(format!("open_table: {e}")))?;

            for record in records {
                let key = record.record_id.as_str().to_string();
                if let Some(existing) = tbl.get(key.as_str()).map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))? {
                    let existing: Record = bincode::serde::decode_from_slice(existing.value(), bincode::config::standard())
                        .map_err(|e| ScrybeError::IntegrityFault(format!("decoding existing record: {e}")))?
                        .0;
                    if existing.content_hash == record.content_hash {
                        outcomes.push(PutOutcome::DuplicateOk);
                        continue;
                    }
                    return Err(ScrybeError::IntegrityFault(format!(
                        "record {} already exists with a different content_hash",
                        record.record_id
                    )));
                }

                let bytes = bincode::serde::encode_to_vec(record, bincode::config::standard())
                    .map_err(|e| ScrybeError::SchemaMismatch(format!("encoding record: {e}")))?;
                tbl.insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;

                let index_key = time_index_key(record.record_type, record.ts_utc, record.record_id.as_str());
                time_tbl
                    .insert(index_key.as_str(), record.record_id.as_str())
                    .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;

                outcomes.push(PutOutcome::Ok);
            }
        }
        tx.commit().map_err(|e| ScrybeError::RecoveryRequired(format!("commit: {e}")))?;
        Ok(outcomes)
    }

    pub fn get(&self, record_id: &RecordId) -> Result<Option<Record>, ScrybeError> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        let tbl = tx
            .open_table(RECORDS_TABLE)
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        match tbl.get(record_id.as_str()).map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))? {
            None => Ok(None),
            Some(v) => {
                let record: Record = bincode::serde::decode_from_slice(v.value(), bincode::config::standard())
                    .map_err(|e| ScrybeError::IntegrityFault(format!("decoding record: {e}")))?
                    .0;
                Ok(Some(record))
            }
        }
    }

    /// Ordered scan of every record of `record_type` whose `ts_utc` falls
    /// in `time_range` (§4.1 `scan`).
    pub fn scan(&self, record_type: RecordType, time_range: Range<i64>) -> Result<Vec<Record>, ScrybeError> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        let time_tbl = tx
            .open_table(TIME_INDEX_TABLE)
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        let records_tbl = tx
            .open_table(RECORDS_TABLE)
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;

        let start_key = time_index_key(record_type, time_range.start, "");
        let end_key = time_index_key(record_type, time_range.end, "");

        let mut out = Vec::new();
        let iter = time_tbl
            .range::<&str>(start_key.as_str()..end_key.as_str())
            .map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
        for entry in iter {
            let (_, value) = entry.map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))?;
            let record_id = value.value();
            if let Some(bytes) = records_tbl.get(record_id).map_err(|e| ScrybeError::RecoveryRequired(e.to_string()))? {
                let record: Record = bincode::serde::decode_from_slice(bytes.value(), bincode::config::standard())
                    .map_err(|e| ScrybeError::IntegrityFault(format!("decoding record: {e}")))?
                    .0;
                out.push(record);
            }
        }
        // Already ordered by the index key, which interleaves (ts_utc, record_id).
        let _ = time_index_prefix(record_type); // documents the relationship; unused directly here
        Ok(out)
    }
}
