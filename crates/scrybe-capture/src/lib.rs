//! C2 — Activity-Aware Capture Scheduler (§4.2). Owns the ACTIVE/IDLE
//! state machine and the thumbnail-fingerprint dedupe engine that bounds
//! how many full frames ever reach C3's Stage-1 normalizer.

pub mod scheduler;
pub mod signal;
pub mod thumbnail;

pub use scheduler::{CaptureMode, CaptureScheduler, FrameCandidate};
pub use signal::{grab_with_timeout, ActivitySample, ActivitySignal, CaptureSource, FrameBuffer, UnavailableActivitySignal};
pub use thumbnail::{NaiveDownsampleThumbnailer, Thumbnailer};
