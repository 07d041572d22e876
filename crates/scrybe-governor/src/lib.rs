//! C5 — Governor (Foreground/Idle) & Scheduler (§4.5). Owns the
//! ACTIVE_CAPTURE_ONLY / IDLE_DRAIN / USER_QUERY mode state machine,
//! samples CPU/RAM telemetry, and decides whether a heavy (Stage-2) job
//! may be admitted or must be preempted.

pub mod admission;
pub mod mode;
pub mod telemetry;

pub use admission::{order_jobs, JobKey};
pub use mode::{Governor, Mode};
pub use telemetry::{ResourceSample, ResourceTelemetry, UnavailableResourceTelemetry};
