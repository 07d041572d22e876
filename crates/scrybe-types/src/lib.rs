//! Shared data model for the evidence pipeline: the closed `RecordType`
//! enumeration, the `Record` envelope, deterministic id derivation, and
//! per-type schema validation. Every other crate in the workspace depends
//! on this one and none of it depends back — lineage (`input_refs`) is a
//! lookup key, never an in-memory pointer graph (§9).

pub mod error;
pub mod ids;
pub mod record;
pub mod record_type;
pub mod schema;

pub use error::{Result, ScrybeError};
pub use ids::{canonical_payload_hash, derive_record_id, sha256_hex, RecordId};
pub use record::{Producer, Record};
pub use record_type::RecordType;
