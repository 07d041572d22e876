//! Declarative configuration (§6 "Configuration"). One struct per table,
//! every field carries an explicit default matching the spec's stated
//! defaults, loaded from a single TOML file the way `aigent-config` loads
//! `config/default.toml`.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The two thumbnail sizes the dedupe fingerprint has historically used
/// (§9 Open Question). Both are kept parseable forever; new captures use
/// whichever this config names, and the choice is recorded per-frame so
/// legacy records are never reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbSize {
    Size64x64,
    Size96x54,
}

impl ThumbSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ThumbSize::Size64x64 => (64, 64),
            ThumbSize::Size96x54 => (96, 54),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ThumbSize::Size64x64 => "64x64",
            ThumbSize::Size96x54 => "96x54",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub active_interval_s: f64,
    pub idle_interval_s: f64,
    pub active_window_s: f64,
    pub assume_active_when_missing: bool,
    pub thumb_size: ThumbSize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            active_interval_s: 0.5,
            idle_interval_s: 60.0,
            active_window_s: 3.0,
            assume_active_when_missing: true,
            thumb_size: ThumbSize::Size64x64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub cpu_cap_pct: f64,
    pub ram_cap_pct: f64,
    pub telemetry_stale_s: f64,
    /// Grace window before a mode-transition preemption takes effect
    /// (§4.5 "after a configurable grace window").
    pub preempt_grace_s: f64,
    pub telemetry_sample_interval_s: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            cpu_cap_pct: 50.0,
            ram_cap_pct: 50.0,
            telemetry_stale_s: 3.0,
            preempt_grace_s: 5.0,
            telemetry_sample_interval_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginHostConfig {
    pub rpc_timeout_s: f64,
    pub max_msg_bytes: usize,
    pub max_concurrent_processes: usize,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_s: 30.0,
            max_msg_bytes: 16 * 1024 * 1024,
            max_concurrent_processes: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub horizon_hours: u64,
    pub lag_warn_ratio: f64,
    /// Hard ceiling the parallelism cap may never exceed even under lag
    /// pressure (§4.6 "Hard ceilings are never exceeded").
    pub max_parallelism_ceiling: usize,
    /// How often the Stage-2 drain loop re-scans for pending work, and
    /// how far back it looks on each scan (bounded by the retention
    /// horizon so a long-idle daemon doesn't re-walk its entire history
    /// every tick).
    pub extract_scan_interval_s: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 144,
            lag_warn_ratio: 0.8,
            max_parallelism_ceiling: 8,
            extract_scan_interval_s: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub p95_latency_ms_budget: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { p95_latency_ms_budget: 500 }
    }
}

/// (AMBIENT) storage engine knobs not named by §6 but required to run the
/// store at all: where on disk the blob directory, metadata db, and
/// ledger file live, plus the anchoring interval from SPEC_FULL's
/// "Ledger chain anchoring" supplement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: String,
    pub anchor_interval_s: u64,
    /// When `true`, failure to unlock the metadata store at boot is
    /// fatal (§4.1 "fails the process closed at boot").
    pub require_encryption: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: ".scrybe/data".to_string(),
            anchor_interval_s: 300,
            require_encryption: false,
        }
    }
}

/// (AMBIENT) daemon process wiring: socket path and log file, mirroring
/// `DaemonConfig` in the teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
    pub log_dir: String,
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/scrybe.sock".to_string(),
            log_dir: ".scrybe/logs".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub governor: GovernorConfig,
    pub plugin_host: PluginHostConfig,
    pub retention: RetentionConfig,
    pub query: QueryConfig,
    pub store: StoreConfig,
    pub daemon: DaemonConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("SCRYBE_SOCKET_PATH") {
            if !value.is_empty() {
                config.daemon.socket_path = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = AppConfig::default();
        assert_eq!(c.capture.active_interval_s, 0.5);
        assert_eq!(c.capture.idle_interval_s, 60.0);
        assert_eq!(c.capture.active_window_s, 3.0);
        assert_eq!(c.governor.cpu_cap_pct, 50.0);
        assert_eq!(c.governor.ram_cap_pct, 50.0);
        assert_eq!(c.governor.telemetry_stale_s, 3.0);
        assert_eq!(c.plugin_host.rpc_timeout_s, 30.0);
        assert_eq!(c.retention.horizon_hours, 144);
        assert_eq!(c.retention.lag_warn_ratio, 0.8);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let c = AppConfig::load_from("/nonexistent/path/does/not/exist.toml").unwrap();
        assert_eq!(c.capture.active_interval_s, 0.5);
    }

    #[test]
    fn round_trips_through_toml() {
        let c = AppConfig::default();
        let rendered = toml::to_string_pretty(&c).unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.capture.idle_interval_s, c.capture.idle_interval_s);
    }
}
