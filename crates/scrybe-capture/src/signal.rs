//! External collaborators (§6): activity signal and OS screen capture.
//! Both are pluggable traits — the concrete OS integrations are out of
//! scope (§1); this crate only specifies the interface and the fail-open
//! fallback behavior when a collaborator is unavailable.

use std::sync::Arc;
use std::time::Duration;

use scrybe_types::ScrybeError;

/// A snapshot of the external activity signal (§6 "Activity signal").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivitySample {
    pub idle_seconds: f64,
    pub is_active: bool,
}

/// Polled activity source. `poll` returning `None` means the signal is
/// unavailable right now — the scheduler fails open to ACTIVE (§4.2
/// "Fail-open rule").
pub trait ActivitySignal: Send + Sync {
    fn poll(&self) -> Option<ActivitySample>;
}

/// Used when no real activity source is wired up — always reports the
/// signal as unavailable, which drives the scheduler's fail-open default.
pub struct UnavailableActivitySignal;

impl ActivitySignal for UnavailableActivitySignal {
    fn poll(&self) -> Option<ActivitySample> {
        None
    }
}

/// One raw captured frame (§6 "OS screen capture").
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (e.g. PNG) — format is an integration detail
    /// outside this spec; only `content_hash`-ability matters here.
    pub bytes: Vec<u8>,
}

/// Synchronous OS screen-grab collaborator, hard-capped by a timeout at
/// the call site (§5 "C2's capture attempt may block on OS screen
/// acquisition, but with a hard timeout").
pub trait CaptureSource: Send + Sync {
    fn grab(&self) -> Result<FrameBuffer, ScrybeError>;
}

/// Attempt a capture with a hard timeout; on timeout the attempt is
/// dropped with the caller expected to write an audit entry (§4.2, §5).
pub async fn grab_with_timeout(
    source: Arc<dyn CaptureSource>,
    timeout: Duration,
) -> Result<FrameBuffer, ScrybeError> {
    // `CaptureSource::grab` is synchronous and may block on OS APIs; run
    // it on a blocking thread so the capture task never stalls the
    // runtime, matching the teacher's `spawn_blocking` pattern for
    // foreign synchronous calls (see `exec::wasm::WasmTool::run`).
    let grab_fut = tokio::task::spawn_blocking(move || source.grab());

    match tokio::time::timeout(timeout, grab_fut).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ScrybeError::DependencyUnavailable(format!(
            "capture task panicked: {join_err}"
        ))),
        Err(_) => Err(ScrybeError::DependencyUnavailable("capture timed out".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    impl CaptureSource for AlwaysFails {
        fn grab(&self) -> Result<FrameBuffer, ScrybeError> {
            Err(ScrybeError::DependencyUnavailable("no display".into()))
        }
    }

    #[tokio::test]
    async fn surfaces_source_errors() {
        let src: Arc<dyn CaptureSource> = Arc::new(AlwaysFails);
        let result = grab_with_timeout(src, Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    struct Slow;
    impl CaptureSource for Slow {
        fn grab(&self) -> Result<FrameBuffer, ScrybeError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(FrameBuffer { width: 1, height: 1, bytes: vec![0] })
        }
    }

    #[tokio::test]
    async fn timeout_drops_slow_capture() {
        let src: Arc<dyn CaptureSource> = Arc::new(Slow);
        let result = grab_with_timeout(src, Duration::from_millis(10)).await;
        assert!(result.is_err());
    }
}
