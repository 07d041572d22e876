//! Capture scheduler state machine and dedupe engine (§4.2).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use scrybe_config::CaptureConfig;
use scrybe_types::{sha256_hex, ScrybeError};

use crate::signal::{grab_with_timeout, ActivitySignal, CaptureSource, FrameBuffer};
use crate::thumbnail::Thumbnailer;

/// ACTIVE/IDLE mode derived from the activity signal (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Active,
    Idle,
}

/// A frame that survived dedupe and is ready to hand to Stage-1 (§4.2
/// step 4). `thumb_sha256`/`thumb_algo` are carried through unchanged so
/// the persisted record can cite the exact fingerprint that admitted it.
#[derive(Debug, Clone)]
pub struct FrameCandidate {
    pub segment_id: String,
    pub frame: FrameBuffer,
    pub thumb_sha256: String,
    pub thumb_algo: String,
}

struct SourceState {
    last_fingerprint: Option<String>,
    last_write: Instant,
}

/// Drives the ACTIVE/IDLE cadence and per-source dedupe for one logical
/// capture source (one monitor/window segment, per `segment_id`).
pub struct CaptureScheduler {
    activity: Arc<dyn ActivitySignal>,
    source: Arc<dyn CaptureSource>,
    thumbnailer: Arc<dyn Thumbnailer>,
    config: CaptureConfig,
    segment_id: String,
    state: Mutex<SourceState>,
}

/// Hard cap on how long a single grab attempt may block the capture
/// loop, independent of the ACTIVE/IDLE cadence (§5).
const GRAB_TIMEOUT: Duration = Duration::from_secs(5);

impl CaptureScheduler {
    pub fn new(
        activity: Arc<dyn ActivitySignal>,
        source: Arc<dyn CaptureSource>,
        thumbnailer: Arc<dyn Thumbnailer>,
        config: CaptureConfig,
        segment_id: impl Into<String>,
    ) -> Self {
        Self {
            activity,
            source,
            thumbnailer,
            config,
            segment_id: segment_id.into(),
            state: Mutex::new(SourceState {
                last_fingerprint: None,
                // Far enough in the past that the first attempt always counts as forced.
                last_write: Instant::now() - Duration::from_secs(3600),
            }),
        }
    }

    /// Current mode. Fails open to ACTIVE when the signal is unavailable
    /// (§4.2 "Fail-open rule"), or to whatever the config says to assume.
    pub fn mode(&self) -> CaptureMode {
        match self.activity.poll() {
            Some(sample) if sample.idle_seconds < self.config.active_window_s => CaptureMode::Active,
            Some(_) => CaptureMode::Idle,
            None if self.config.assume_active_when_missing => CaptureMode::Active,
            None => CaptureMode::Idle,
        }
    }

    /// Poll interval for the current mode (§4.2 default cadences).
    pub fn interval(&self) -> Duration {
        match self.mode() {
            CaptureMode::Active => Duration::from_secs_f64(self.config.active_interval_s),
            CaptureMode::Idle => Duration::from_secs_f64(self.config.idle_interval_s),
        }
    }

    /// Run one capture attempt end to end (§4.2 steps 1-4). Returns
    /// `Ok(None)` when the candidate was dropped as a duplicate; the
    /// caller never sees the full frame bytes of a dropped candidate,
    /// satisfying "no full-frame hashing occurs on dropped candidates" —
    /// the scheduler's own hash of the frame bytes never happens either,
    /// since only the downscaled thumbnail is ever fingerprinted.
    pub async fn attempt(&self) -> Result<Option<FrameCandidate>, ScrybeError> {
        let mode = self.mode();
        let frame = grab_with_timeout(self.source.clone(), GRAB_TIMEOUT).await?;

        let thumb = self.thumbnailer.thumbnail(&frame, self.config.thumb_size);
        let mut canonical = self.config.thumb_size.tag().as_bytes().to_vec();
        canonical.extend_from_slice(&thumb);
        let fingerprint = sha256_hex(&canonical);

        let idle_deadline = Duration::from_secs_f64(self.config.idle_interval_s);
        let (is_duplicate, forced) = {
            let state = self.state.lock().unwrap();
            let dup = state.last_fingerprint.as_deref() == Some(fingerprint.as_str());
            let forced = state.last_write.elapsed() >= idle_deadline;
            (dup, forced)
        };

        if is_duplicate && !(mode == CaptureMode::Idle && forced) {
            return Ok(None);
        }

        {
            let mut state = self.state.lock().unwrap();
            state.last_fingerprint = Some(fingerprint.clone());
            state.last_write = Instant::now();
        }

        Ok(Some(FrameCandidate {
            segment_id: self.segment_id.clone(),
            frame,
            thumb_sha256: fingerprint,
            thumb_algo: self.config.thumb_size.tag().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ActivitySample, UnavailableActivitySignal};
    use crate::thumbnail::NaiveDownsampleThumbnailer;

    struct FixedActivity(f64);
    impl ActivitySignal for FixedActivity {
        fn poll(&self) -> Option<ActivitySample> {
            Some(ActivitySample { idle_seconds: self.0, is_active: self.0 < 3.0 })
        }
    }

    struct StaticSource;
    impl CaptureSource for StaticSource {
        fn grab(&self) -> Result<FrameBuffer, ScrybeError> {
            Ok(FrameBuffer { width: 10, height: 10, bytes: vec![1u8; 400] })
        }
    }

    struct ChangingSource(std::sync::atomic::AtomicU8);
    impl CaptureSource for ChangingSource {
        fn grab(&self) -> Result<FrameBuffer, ScrybeError> {
            let v = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(FrameBuffer { width: 10, height: 10, bytes: vec![v; 400] })
        }
    }

    fn config() -> CaptureConfig {
        CaptureConfig::default()
    }

    #[tokio::test]
    async fn missing_signal_fails_open_to_active() {
        let sched = CaptureScheduler::new(
            Arc::new(UnavailableActivitySignal),
            Arc::new(StaticSource),
            Arc::new(NaiveDownsampleThumbnailer),
            config(),
            "seg-0",
        );
        assert_eq!(sched.mode(), CaptureMode::Active);
    }

    #[tokio::test]
    async fn first_attempt_is_never_dropped() {
        let sched = CaptureScheduler::new(
            Arc::new(FixedActivity(0.0)),
            Arc::new(StaticSource),
            Arc::new(NaiveDownsampleThumbnailer),
            config(),
            "seg-0",
        );
        let candidate = sched.attempt().await.unwrap();
        assert!(candidate.is_some());
    }

    #[tokio::test]
    async fn active_mode_drops_duplicate_frame() {
        let sched = CaptureScheduler::new(
            Arc::new(FixedActivity(0.0)),
            Arc::new(StaticSource),
            Arc::new(NaiveDownsampleThumbnailer),
            config(),
            "seg-0",
        );
        assert!(sched.attempt().await.unwrap().is_some());
        assert!(sched.attempt().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn changing_frame_is_not_dropped() {
        let sched = CaptureScheduler::new(
            Arc::new(FixedActivity(0.0)),
            Arc::new(ChangingSource(std::sync::atomic::AtomicU8::new(0))),
            Arc::new(NaiveDownsampleThumbnailer),
            config(),
            "seg-0",
        );
        let first = sched.attempt().await.unwrap();
        let second = sched.attempt().await.unwrap();
        assert!(first.is_some());
        assert!(second.is_some());
        assert_ne!(first.unwrap().thumb_sha256, second.unwrap().thumb_sha256);
    }

    #[tokio::test]
    async fn idle_mode_forces_write_after_deadline_elapsed() {
        let mut cfg = config();
        cfg.idle_interval_s = 0.0;
        let sched = CaptureScheduler::new(
            Arc::new(FixedActivity(60.0)),
            Arc::new(StaticSource),
            Arc::new(NaiveDownsampleThumbnailer),
            cfg,
            "seg-0",
        );
        assert!(sched.attempt().await.unwrap().is_some());
        // idle_interval_s == 0 means every subsequent attempt is already past
        // the force deadline by the time it checks, even for a static screen.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(sched.attempt().await.unwrap().is_some());
    }
}
