//! Static half of the "Stage-1 MUST NOT import or invoke OCR/VLM/
//! embedding code" enforcement (§4.3). The dynamic half lives in
//! `scrybe-plugins`'s capability broker, which denies those
//! capabilities to any plugin invoked from this crate's call sites.
//!
//! This module audits a *declared* dependency name list rather than
//! walking `Cargo.lock` at runtime — there is no metadata-parsing crate
//! in this workspace's stack, so the list below is kept in sync with
//! `Cargo.toml` by hand and checked at daemon startup.

use scrybe_types::ScrybeError;

/// Substrings that must never appear in a Stage-1 dependency name. Kept
/// deliberately broad: a crate named `acme-vlm-client` or
/// `fast-embedding` both trip this, not just exact matches.
const FORBIDDEN_SUBSTRINGS: &[&str] = &["ocr", "vlm", "embedding", "clip", "whisper"];

/// `scrybe-ingest`'s own declared non-dev dependencies, mirrored from
/// `Cargo.toml`. Checked against the forbidden list at startup so an
/// accidental `cargo add` of an extraction crate into this crate fails
/// closed before the daemon finishes booting.
pub const DECLARED_DEPENDENCIES: &[&str] =
    &["scrybe-types", "scrybe-config", "scrybe-store", "scrybe-audit", "scrybe-capture", "anyhow", "serde_json", "tracing", "uuid"];

pub fn audit_dependency_names(names: &[&str]) -> Result<(), ScrybeError> {
    for name in names {
        let lower = name.to_ascii_lowercase();
        if let Some(hit) = FORBIDDEN_SUBSTRINGS.iter().find(|f| lower.contains(*f)) {
            return Err(ScrybeError::IntegrityFault(format!(
                "Stage-1 dependency audit failed: `{name}` matches forbidden pattern `{hit}`"
            )));
        }
    }
    Ok(())
}

/// Convenience entry point for the daemon's startup sequence: audits
/// this crate's own declared dependency list.
pub fn audit_self() -> Result<(), ScrybeError> {
    audit_dependency_names(DECLARED_DEPENDENCIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_audit_passes() {
        assert!(audit_self().is_ok());
    }

    #[test]
    fn forbidden_substring_is_rejected() {
        let err = audit_dependency_names(&["acme-vlm-client"]).unwrap_err();
        assert_eq!(err.kind(), "integrity_fault");
    }

    #[test]
    fn case_insensitive_match() {
        assert!(audit_dependency_names(&["Fast-OCR-Engine"]).is_err());
    }
}
