//! Signed plugin lock file (§4.4 "Plugin artifacts are content-hashed
//! and pinned in a signed lock; a mismatch ... is a fatal boot error
//! unless the plugin is marked deprecated"). Reused idea from §9's
//! "Runtime reflection / plugin discovery" redesign note: manifests are
//! validated against a signed lock rather than discovered ad hoc.

use std::path::Path;

use scrybe_types::ScrybeError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::manifest::PluginManifest;

/// `plugins.lock.json` on disk: the manifest set plus a detached
/// signature over the canonical JSON of that set. The signature scheme
/// itself is an integration detail (§1 scope); [`LockVerifier`] is the
/// seam a host plugs a real signer into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginLock {
    pub plugins: Vec<PluginManifest>,
    pub signature: String,
}

/// Verifies a lock file's signature against its canonical plugin-set
/// bytes. A real deployment wires in an Ed25519 (or similar) verifier;
/// this crate only defines the seam and a trivial default.
pub trait LockVerifier: Send + Sync {
    fn verify(&self, canonical_bytes: &[u8], signature: &str) -> bool;
}

/// Accepts any signature whose value is the sha256 hex digest of the
/// canonical bytes — a content-integrity check without public-key
/// cryptography. Suitable for local development; production deployments
/// should supply a real [`LockVerifier`].
pub struct DigestOnlyVerifier;

impl LockVerifier for DigestOnlyVerifier {
    fn verify(&self, canonical_bytes: &[u8], signature: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(canonical_bytes);
        format!("{:x}", hasher.finalize()) == signature
    }
}

fn canonical_bytes(plugins: &[PluginManifest]) -> Result<Vec<u8>, ScrybeError> {
    let value = serde_json::to_value(plugins)
        .map_err(|e| ScrybeError::SchemaMismatch(format!("serializing plugin set: {e}")))?;
    serde_json::to_vec(&value).map_err(|e| ScrybeError::SchemaMismatch(format!("encoding plugin set: {e}")))
}

/// Sign a plugin set with [`DigestOnlyVerifier`]'s scheme. A convenience
/// for tests and local lock-file generation; production signing happens
/// out of process with the real private key.
pub fn sign_with_digest(plugins: &[PluginManifest]) -> Result<PluginLock, ScrybeError> {
    let bytes = canonical_bytes(plugins)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(PluginLock { plugins: plugins.to_vec(), signature: format!("{:x}", hasher.finalize()) })
}

/// Load and verify a lock file from disk. Fails closed — an invalid
/// signature or unreadable file never yields a usable plugin set.
pub fn load_verified(path: impl AsRef<Path>, verifier: &dyn LockVerifier) -> Result<Vec<PluginManifest>, ScrybeError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| ScrybeError::RecoveryRequired(format!("reading plugin lock: {e}")))?;
    let lock: PluginLock = serde_json::from_slice(&bytes)
        .map_err(|e| ScrybeError::SchemaMismatch(format!("parsing plugin lock: {e}")))?;
    let canonical = canonical_bytes(&lock.plugins)?;
    if !verifier.verify(&canonical, &lock.signature) {
        return Err(ScrybeError::IntegrityFault("plugin lock signature verification failed".to_string()));
    }
    Ok(lock.plugins)
}

/// Check an on-disk plugin artifact's actual content hash against the
/// manifest's pinned `content_sha256`. A mismatch is a fatal boot error
/// unless `deprecated` is set (§4.4).
pub fn verify_artifact_hash(manifest: &PluginManifest, artifact_bytes: &[u8]) -> Result<(), ScrybeError> {
    let mut hasher = Sha256::new();
    hasher.update(artifact_bytes);
    let actual = format!("{:x}", hasher.finalize());
    if actual == manifest.content_sha256 {
        return Ok(());
    }
    if manifest.deprecated {
        return Ok(());
    }
    Err(ScrybeError::IntegrityFault(format!(
        "plugin `{}` artifact hash mismatch: expected {}, got {actual}",
        manifest.plugin_id, manifest.content_sha256
    )))
}
