//! Content-addressed blob directory (§6 "one content-addressed blob
//! directory (sharded by the first two hex chars of `blob_id`)").
//!
//! Blobs are immutable once written (§5 "Shared-resource policy") and
//! shared across frames with identical bytes. Writes go temp-then-rename
//! so a reader never observes a partial blob (§4.1 "partial writes are
//! never observable").

use std::path::{Path, PathBuf};

use scrybe_types::{sha256_hex, ScrybeError};

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ScrybeError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("creating blob root {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn shard_path(&self, blob_id: &str) -> PathBuf {
        let shard = &blob_id[..2.min(blob_id.len())];
        self.root.join(shard)
    }

    pub fn blob_path(&self, blob_id: &str) -> PathBuf {
        self.shard_path(blob_id).join(blob_id)
    }

    fn tmp_path(&self, blob_id: &str) -> PathBuf {
        self.shard_path(blob_id).join(format!("{blob_id}.tmp-{}", std::process::id()))
    }

    /// Write `bytes`, return its content-addressed id. A second call with
    /// byte-identical content is a cheap no-op (the file already exists);
    /// the write is atomic via temp-then-rename so partial writes are
    /// never observable by a concurrent reader.
    pub fn put_blob(&self, bytes: &[u8]) -> Result<String, ScrybeError> {
        let blob_id = sha256_hex(bytes);
        let final_path = self.blob_path(&blob_id);
        if final_path.exists() {
            return Ok(blob_id);
        }

        let shard_dir = self.shard_path(&blob_id);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("creating blob shard {}: {e}", shard_dir.display())))?;

        let tmp_path = self.tmp_path(&blob_id);
        std::fs::write(&tmp_path, bytes)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("writing blob tmp file: {e}")))?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            ScrybeError::RecoveryRequired(format!("renaming blob into place: {e}"))
        })?;
        Ok(blob_id)
    }

    pub fn get_blob(&self, blob_id: &str) -> Result<Option<Vec<u8>>, ScrybeError> {
        let path = self.blob_path(blob_id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ScrybeError::RecoveryRequired(format!("reading blob {blob_id}: {e}"))),
        }
    }

    pub fn has_blob(&self, blob_id: &str) -> bool {
        self.blob_path(blob_id).exists()
    }

    /// Remove any orphaned `.tmp-*` files left by a crash mid-write
    /// (§4.1 "a startup recovery scan reconciles any uncommitted tails").
    pub fn reap_orphan_tmp_files(&self) -> Result<usize, ScrybeError> {
        let mut removed = 0usize;
        if !self.root.is_dir() {
            return Ok(0);
        }
        for shard_entry in std::fs::read_dir(&self.root)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("reading blob root: {e}")))?
        {
            let shard_entry = match shard_entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let shard_path = shard_entry.path();
            if !shard_path.is_dir() {
                continue;
            }
            let Ok(files) = std::fs::read_dir(&shard_path) else { continue };
            for file in files.flatten() {
                let path = file.path();
                if is_orphan_tmp(&path) {
                    if std::fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_orphan_tmp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(".tmp-"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_blob_is_content_addressed_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let id1 = store.put_blob(b"hello").unwrap();
        let id2 = store.put_blob(b"hello").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.get_blob(&id1).unwrap().unwrap(), b"hello");
    }

    #[test]
    fn shards_by_first_two_hex_chars() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let id = store.put_blob(b"shard-me").unwrap();
        let path = store.blob_path(&id);
        let shard = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(shard, &id[..2]);
    }

    #[test]
    fn reap_removes_orphan_tmp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let shard_dir = dir.path().join("ab");
        std::fs::create_dir_all(&shard_dir).unwrap();
        std::fs::write(shard_dir.join("abcd.tmp-1234"), b"partial").unwrap();
        let removed = store.reap_orphan_tmp_files().unwrap();
        assert_eq!(removed, 1);
    }
}
