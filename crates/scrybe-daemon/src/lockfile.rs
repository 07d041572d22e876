//! Single-instance lock and pidfile, mirroring the teacher's
//! `interfaces/cli/src/daemon.rs::run_daemon_process` lifecycle: an
//! exclusive `fs2` lock held for the process's lifetime, released
//! automatically (and its file removed) on drop.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use scrybe_types::ScrybeError;

pub struct InstanceLock {
    _file: File,
    lock_path: PathBuf,
}

impl InstanceLock {
    /// Acquire the single-instance lock, failing closed if another
    /// daemon process already holds it.
    pub fn acquire(runtime_dir: impl AsRef<Path>) -> Result<Self, ScrybeError> {
        let runtime_dir = runtime_dir.as_ref();
        fs::create_dir_all(runtime_dir)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("creating runtime dir: {e}")))?;

        let lock_path = runtime_dir.join("daemon.lock");
        let file = File::create(&lock_path)
            .map_err(|e| ScrybeError::RecoveryRequired(format!("creating lock file: {e}")))?;
        file.try_lock_exclusive().map_err(|_| {
            ScrybeError::IntegrityFault("another scrybe daemon instance already holds the lock".to_string())
        })?;

        fs::write(runtime_dir.join("daemon.pid"), std::process::id().to_string())
            .map_err(|e| ScrybeError::RecoveryRequired(format!("writing pid file: {e}")))?;

        Ok(Self { _file: file, lock_path })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
