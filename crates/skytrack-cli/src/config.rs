//! TOML configuration consumed (not owned) by the decision core.
//!
//! A missing file means defaults; a file that exists but does not parse is a
//! startup error.  Every knob has a default matching the core's built-in
//! values, so a partial file only overrides what it names.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use skytrack_kernel::GateConfig;
use skytrack_perception::{BatchFusionConfig, TailerConfig};
use skytrack_runtime::ControllerConfig;
use skytrack_types::{CommandKind, TrackError, jsonl};

/// Root of `configs/skytrack.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fsm: ControllerConfig,
    pub gate: GateSettings,
    pub fusion: FusionSettings,
}

/// `[gate]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub max_rate_hz: f64,
    pub command_ttl_sec: f64,
    /// Wire names of the allow-listed command kinds.
    pub allow_types: Vec<CommandKind>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            max_rate_hz: 5.0,
            command_ttl_sec: 1.0,
            allow_types: vec![
                CommandKind::SetHeading,
                CommandKind::SetFlightMode,
                CommandKind::EmergencyStop,
            ],
        }
    }
}

impl GateSettings {
    pub fn to_gate_config(&self) -> GateConfig {
        GateConfig {
            max_rate_hz: self.max_rate_hz,
            command_ttl_sec: self.command_ttl_sec,
            allow_types: self.allow_types.iter().copied().collect(),
        }
    }
}

/// `[fusion]` section, shared by the batch pass and the live tailer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub max_gap_ms: i64,
    pub poll_interval_ms: u64,
    pub emit_interval_ms: u64,
    /// Synthetic NO_SIGNAL cadence for the live tailer; absent disables it.
    pub no_signal_interval_ms: Option<u64>,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            max_gap_ms: 200,
            poll_interval_ms: 100,
            emit_interval_ms: 200,
            no_signal_interval_ms: None,
        }
    }
}

impl FusionSettings {
    pub fn to_batch_config(&self) -> BatchFusionConfig {
        BatchFusionConfig {
            max_gap_ms: self.max_gap_ms,
        }
    }

    pub fn to_tailer_config(&self) -> TailerConfig {
        TailerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            emit_interval: Duration::from_millis(self.emit_interval_ms),
            no_signal_interval: self.no_signal_interval_ms.map(Duration::from_millis),
        }
    }
}

/// Load the configuration from `path`; a missing file yields the defaults.
pub fn load(path: &Path) -> Result<Config, TrackError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| jsonl::io_err(path, &e))?;
    toml::from_str(&raw).map_err(|e| TrackError::Config(format!("{}: {e}", path.display())))
}
