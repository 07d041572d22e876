//! Plugin host and capability broker (§4.4): loads a signed plugin
//! lock, checks every capability a plugin tries to exercise against its
//! manifest and any stage-scoped policy override, and invokes plugins
//! over a length-prefixed RPC envelope under a sandboxed, capped
//! process pool or a one-shot WASM instantiation.

pub mod broker;
pub mod capability;
pub mod host;
pub mod lock;
pub mod manifest;
pub mod process_pool;
pub mod rpc;
pub mod sandbox;
pub mod wasm;

pub use broker::CapabilityBroker;
pub use capability::Capability;
pub use host::PluginHost;
pub use lock::{sign_with_digest, load_verified, verify_artifact_hash, DigestOnlyVerifier, LockVerifier, PluginLock};
pub use manifest::{PluginManifest, StageScope};
pub use process_pool::ProcessPool;
pub use rpc::{read_frame, write_frame, PluginRequest, PluginResponse, ResponseStatus};
pub use wasm::WasmPlugin;
