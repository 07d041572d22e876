//! The three-way mode state machine (§4.5).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use scrybe_capture::CaptureMode;
use scrybe_config::GovernorConfig;
use scrybe_types::ScrybeError;
use tokio::sync::watch;

use crate::telemetry::{ResourceSample, ResourceTelemetry, TimestampedSample};

/// One of the three runtime modes the governor arbitrates between
/// (§4.5). `Eq`/`Copy` so callers can cheaply compare against a
/// `watch::Receiver`'s borrowed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    ActiveCaptureOnly,
    IdleDrain,
    UserQuery,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::ActiveCaptureOnly => "ACTIVE_CAPTURE_ONLY",
            Mode::IdleDrain => "IDLE_DRAIN",
            Mode::UserQuery => "USER_QUERY",
        }
    }

    /// `true` for modes that may admit heavy (Stage-2) work (§4.5
    /// "Admission rule").
    pub fn admits_heavy_work(self) -> bool {
        matches!(self, Mode::IdleDrain | Mode::UserQuery)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BudgetState {
    Ok,
    Exceeded,
    TelemetryStale,
}

struct GovernorState {
    mode: Mode,
    query_intent: bool,
    last_sample: Option<TimestampedSample>,
    /// Set the instant the mode most recently transitioned *into*
    /// `ActiveCaptureOnly`; used for the preemption grace window
    /// (§4.5 "Preemption rule ... after a configurable grace window").
    active_transition_at: Option<Instant>,
}

/// Runtime arbiter of capture/extraction/query modes under CPU/RAM
/// budgets (Glossary "Governor"). One instance is shared across the
/// daemon; `subscribe()` hands out a `watch::Receiver` so Stage-2
/// workers can react to mode changes without polling.
pub struct Governor {
    config: GovernorConfig,
    telemetry: Box<dyn ResourceTelemetry>,
    state: Mutex<GovernorState>,
    mode_tx: watch::Sender<Mode>,
}

impl Governor {
    pub fn new(config: GovernorConfig, telemetry: Box<dyn ResourceTelemetry>) -> Self {
        let (mode_tx, _rx) = watch::channel(Mode::ActiveCaptureOnly);
        Self {
            config,
            telemetry,
            state: Mutex::new(GovernorState {
                mode: Mode::ActiveCaptureOnly,
                query_intent: false,
                last_sample: None,
                active_transition_at: None,
            }),
            mode_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Mode> {
        self.mode_tx.subscribe()
    }

    pub fn current_mode(&self) -> Mode {
        self.state.lock().unwrap().mode
    }

    /// Poll the telemetry collaborator and record the reading (§4.5 "the
    /// governor samples resources at 1s cadence"). Driven by a periodic
    /// task in the daemon at `telemetry_sample_interval_s`.
    pub fn sample_telemetry(&self) {
        if let Some(sample) = self.telemetry.sample() {
            self.record_sample(sample);
        }
    }

    /// Testing/injection seam: record a reading directly without going
    /// through the `ResourceTelemetry` trait object.
    pub fn record_sample(&self, sample: ResourceSample) {
        let mut state = self.state.lock().unwrap();
        state.last_sample = Some(TimestampedSample { sample, sampled_at: Instant::now() });
    }

    /// Recompute mode from C2's current ACTIVE/IDLE state and the
    /// explicit query-intent flag, publishing a change over the watch
    /// channel (§4.5: ACTIVE_CAPTURE_ONLY unless an explicit
    /// `query_intent=true` forces USER_QUERY, else IDLE_DRAIN when the
    /// capture scheduler reports IDLE).
    pub fn update_capture_mode(&self, capture_mode: CaptureMode) {
        let mut state = self.state.lock().unwrap();
        let new_mode = Self::resolve_mode(state.query_intent, capture_mode);
        Self::transition(&mut state, new_mode, &self.mode_tx);
    }

    /// Set or clear the explicit operator-forced query-intent flag
    /// (§4.5 "USER_QUERY: explicit operator-forced flow ... sets
    /// `query_intent=true`"). The caller is expected to re-supply the
    /// last known capture mode so a clear doesn't spuriously force
    /// ACTIVE_CAPTURE_ONLY before the next capture-mode update arrives.
    pub fn set_query_intent(&self, active: bool, capture_mode: CaptureMode) {
        let mut state = self.state.lock().unwrap();
        state.query_intent = active;
        let new_mode = Self::resolve_mode(active, capture_mode);
        Self::transition(&mut state, new_mode, &self.mode_tx);
    }

    fn resolve_mode(query_intent: bool, capture_mode: CaptureMode) -> Mode {
        if query_intent {
            return Mode::UserQuery;
        }
        match capture_mode {
            CaptureMode::Active => Mode::ActiveCaptureOnly,
            CaptureMode::Idle => Mode::IdleDrain,
        }
    }

    fn transition(state: &mut GovernorState, new_mode: Mode, mode_tx: &watch::Sender<Mode>) {
        if new_mode == state.mode {
            return;
        }
        if new_mode == Mode::ActiveCaptureOnly {
            state.active_transition_at = Some(Instant::now());
        } else {
            state.active_transition_at = None;
        }
        state.mode = new_mode;
        let _ = mode_tx.send(new_mode);
    }

    /// `true` iff a heavy job may start right now (§4.5 "Admission
    /// rule"): mode admits heavy work, telemetry is fresh, and both
    /// CPU% and RAM% are within their configured caps. A missing or
    /// stale sample fails closed — heavy admission is denied, matching
    /// "samples older than 3s ... disable heavy admission fail-safe".
    pub fn admit_heavy_job(&self) -> Result<(), ScrybeError> {
        let state = self.state.lock().unwrap();
        if !state.mode.admits_heavy_work() {
            return Err(ScrybeError::Preempted(format!(
                "mode {} does not admit heavy work",
                state.mode.as_str()
            )));
        }

        let stale_after = Duration::from_secs_f64(self.config.telemetry_stale_s);
        let Some(sample) = &state.last_sample else {
            return Err(ScrybeError::DependencyUnavailable(
                "no resource telemetry sample yet; heavy admission disabled fail-safe".to_string(),
            ));
        };
        if sample.is_stale(stale_after) {
            return Err(ScrybeError::DependencyUnavailable(
                "resource telemetry is stale; heavy admission disabled fail-safe".to_string(),
            ));
        }
        if sample.sample.cpu_pct > self.config.cpu_cap_pct || sample.sample.ram_pct > self.config.ram_cap_pct {
            return Err(ScrybeError::BudgetExceeded(format!(
                "cpu={:.1}% (cap {:.1}%) ram={:.1}% (cap {:.1}%)",
                sample.sample.cpu_pct, self.config.cpu_cap_pct, sample.sample.ram_pct, self.config.ram_cap_pct
            )));
        }
        Ok(())
    }

    /// `true` iff a currently-running heavy job must be preempted
    /// (§4.5 "Preemption rule", §5 "Cancellation"). `job_is_user_query`
    /// marks a job admitted under USER_QUERY: it suppresses *mode-only*
    /// preemption, but a budget-exceeded or stale-telemetry condition
    /// still preempts it — §4.5 "preempted iff budget is exceeded OR
    /// (mode transitions to ACTIVE_CAPTURE_ONLY AND mode ≠ USER_QUERY)
    /// after a configurable grace window".
    pub fn should_preempt(&self, job_is_user_query: bool) -> bool {
        let state = self.state.lock().unwrap();
        let budget_exceeded = matches!(
            self.budget_state(&state),
            BudgetState::Exceeded | BudgetState::TelemetryStale
        );
        if budget_exceeded {
            return true;
        }
        if job_is_user_query {
            return false;
        }
        if matches!(state.mode, Mode::ActiveCaptureOnly) {
            let grace = Duration::from_secs_f64(self.config.preempt_grace_s);
            return state.active_transition_at.map(|at| at.elapsed() >= grace).unwrap_or(true);
        }
        false
    }

    fn budget_state(&self, state: &GovernorState) -> BudgetState {
        let stale_after = Duration::from_secs_f64(self.config.telemetry_stale_s);
        let Some(sample) = &state.last_sample else {
            return BudgetState::TelemetryStale;
        };
        if sample.is_stale(stale_after) {
            return BudgetState::TelemetryStale;
        }
        if sample.sample.cpu_pct > self.config.cpu_cap_pct || sample.sample.ram_pct > self.config.ram_cap_pct {
            return BudgetState::Exceeded;
        }
        BudgetState::Ok
    }
}
