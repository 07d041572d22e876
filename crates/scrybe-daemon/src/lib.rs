//! Daemon wiring (§5 "independent tasks coordinating through bounded
//! queues and an event bus"). Assembles C1-C9 into a shared
//! [`RuntimeContext`] plus the background tasks and the loopback query
//! socket, the same shape as the teacher's `run_unified_daemon` and
//! `interfaces/cli/src/daemon.rs` process lifecycle.

pub mod anchor;
pub mod capture_task;
pub mod context;
pub mod extract_task;
pub mod lockfile;
pub mod query_socket;
pub mod retention_stream;
pub mod run;

pub use context::RuntimeContext;
pub use lockfile::InstanceLock;
pub use retention_stream::RetentionEventStream;
pub use run::run_daemon;
