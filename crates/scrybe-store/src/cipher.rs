//! Pluggable at-rest encryption for the metadata store (§4.1 "the
//! metadata store MAY be opened through an encrypted backend; when
//! encryption is declared required, failure to unlock fails the process
//! closed at boot"). The actual cipher backend is outside this exercise's
//! scope (§1); this trait is the seam a host integration plugs into.

use scrybe_types::ScrybeError;

pub trait MetadataCipher: Send + Sync {
    /// Attempt to unlock the store. `Ok(())` means the backend is ready;
    /// `Err` means boot must fail closed when encryption is required.
    fn unlock(&self) -> Result<(), ScrybeError>;
}

/// Default backend: no encryption declared, so `unlock` always succeeds.
pub struct NoCipher;

impl MetadataCipher for NoCipher {
    fn unlock(&self) -> Result<(), ScrybeError> {
        Ok(())
    }
}

/// Boot gate: if `require_encryption` is set, `cipher.unlock()` must
/// succeed or the process must not start (fail-closed).
pub fn enforce_boot_policy(require_encryption: bool, cipher: &dyn MetadataCipher) -> Result<(), ScrybeError> {
    if !require_encryption {
        return Ok(());
    }
    cipher.unlock()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    impl MetadataCipher for AlwaysFails {
        fn unlock(&self) -> Result<(), ScrybeError> {
            Err(ScrybeError::RecoveryRequired("locked".into()))
        }
    }

    #[test]
    fn not_required_skips_unlock() {
        assert!(enforce_boot_policy(false, &AlwaysFails).is_ok());
    }

    #[test]
    fn required_and_failing_fails_closed() {
        assert!(enforce_boot_policy(true, &AlwaysFails).is_err());
    }

    #[test]
    fn required_and_succeeding_boots() {
        assert!(enforce_boot_policy(true, &NoCipher).is_ok());
    }
}
