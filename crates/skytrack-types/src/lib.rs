//! Shared data contracts for the SkyTrack decision core.
//!
//! Every sensor pipeline, the fusion engine, the command gate, and the state
//! controller exchange data exclusively through the types defined here:
//! append-only [`Observation`] records, the closed [`VehicleCommand`] union,
//! the telemetry [`LinkStatus`], and the audit-log record shapes.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod jsonl;

// ────────────────────────────────────────────────────────────────────────────
// Time
// ────────────────────────────────────────────────────────────────────────────

/// Dual timestamp attached to every record the core reads or writes.
///
/// `mono_ms` is the ordering key for all time-ordered processing; `epoch_ms`
/// is wall-clock time kept only for staleness display and human inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStamp {
    /// Milliseconds on the producing process's monotonic clock.
    #[serde(default, alias = "t_mono_ms")]
    pub mono_ms: i64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub epoch_ms: i64,
}

/// Process-scoped clock that stamps records with a [`TimeStamp`].
///
/// The monotonic origin is captured at construction, so all timestamps
/// produced by one `TimeBase` share a common zero.
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    origin: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Current [`TimeStamp`] on this timebase.
    pub fn now(&self) -> TimeStamp {
        TimeStamp {
            mono_ms: self.origin.elapsed().as_millis() as i64,
            epoch_ms: Utc::now().timestamp_millis(),
        }
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Observations
// ────────────────────────────────────────────────────────────────────────────

/// Logical producer of an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Vision,
    Thermal,
    Audio,
    /// Merged estimate produced by the fusion engine.  Older logs spell this
    /// `fused`; both are accepted on input.
    #[serde(alias = "fused")]
    Fusion,
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Vision => write!(f, "vision"),
            SourceId::Thermal => write!(f, "thermal"),
            SourceId::Audio => write!(f, "audio"),
            SourceId::Fusion => write!(f, "fusion"),
        }
    }
}

/// Signal quality reported by a producer (or by fusion for merged records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObsStatus {
    Ok,
    NoSignal,
    Degraded,
    Invalid,
}

/// Rectangular region of interest in the producing sensor's pixel frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Structured observation metadata.
///
/// `sources` and `block_index` are the fields the core actually consumes;
/// everything else a producer attaches rides along in `meta` untouched so
/// newer producers stay compatible with older consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObsExtras {
    /// Sources that contributed to this record (fusion fills this in).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceId>,
    /// Processing block the record belongs to, when the producer batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u64>,
    /// Open side-channel for forward-compatible metadata.
    #[serde(flatten)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// One record of a per-source observation log, and the shape of the merged
/// records the fusion engine emits (`source = fusion`).
///
/// `bearing_deg` is present only when `status` plausibly allows it; consumers
/// never trust `confidence` raw and clamp it to `[0.05, 1.0]` (absent means a
/// neutral weight of 0.5 — see `skytrack-perception`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Record schema version; fusion writes `"0.1"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub time: TimeStamp,
    pub source: SourceId,
    #[serde(default)]
    pub bearing_deg: Option<f64>,
    #[serde(default)]
    pub roi: Option<Roi>,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub status: ObsStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<ObsExtras>,
}

impl Observation {
    /// `true` when the record can drive the primary state machine: status is
    /// `OK` and a bearing is present.
    pub fn is_valid(&self) -> bool {
        self.status == ObsStatus::Ok && self.bearing_deg.is_some()
    }

    /// `true` when `id` produced this record or is named as a contributor.
    pub fn names_source(&self, id: SourceId) -> bool {
        if self.source == id {
            return true;
        }
        self.extras
            .as_ref()
            .is_some_and(|e| e.sources.contains(&id))
    }

    /// Contributing sources declared in `extras`, empty when absent.
    pub fn contributors(&self) -> &[SourceId] {
        self.extras.as_ref().map_or(&[], |e| e.sources.as_slice())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Vehicle commands
// ────────────────────────────────────────────────────────────────────────────

/// Closed union of every command the core may ask the vehicle sink to carry
/// out.  The gate's allow-list is a set over [`CommandKind`], so no
/// string-typed command name ever reaches a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum VehicleCommand {
    /// Rotate toward an absolute (or relative) bearing.
    SetHeading {
        heading_deg: f64,
        rate_deg_s: f64,
        relative: bool,
    },
    /// Switch the vehicle flight mode (e.g. `"RTL"`).
    SetFlightMode { mode: String },
    /// Immediate safety stop.
    EmergencyStop,
}

impl VehicleCommand {
    /// Fieldless discriminant used by the gate's allow-list.
    pub fn kind(&self) -> CommandKind {
        match self {
            VehicleCommand::SetHeading { .. } => CommandKind::SetHeading,
            VehicleCommand::SetFlightMode { .. } => CommandKind::SetFlightMode,
            VehicleCommand::EmergencyStop => CommandKind::EmergencyStop,
        }
    }

    /// Parameters of this command as a JSON object for the commands log.
    pub fn params_json(&self) -> serde_json::Value {
        match self {
            VehicleCommand::SetHeading {
                heading_deg,
                rate_deg_s,
                relative,
            } => serde_json::json!({
                "heading_deg": heading_deg,
                "rate_deg_s": rate_deg_s,
                "relative": relative,
            }),
            VehicleCommand::SetFlightMode { mode } => serde_json::json!({ "mode": mode }),
            VehicleCommand::EmergencyStop => serde_json::json!({}),
        }
    }
}

/// Command type discriminant.  The wire names match the existing command-log
/// consumers (`SET_HEADING`, `SET_MODE`, `STOP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    #[serde(rename = "SET_HEADING")]
    SetHeading,
    #[serde(rename = "SET_MODE")]
    SetFlightMode,
    #[serde(rename = "STOP")]
    EmergencyStop,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::SetHeading => write!(f, "SET_HEADING"),
            CommandKind::SetFlightMode => write!(f, "SET_MODE"),
            CommandKind::EmergencyStop => write!(f, "STOP"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Link status
// ────────────────────────────────────────────────────────────────────────────

/// Health of the vehicle telemetry/command channel.
///
/// The command gate requires exactly [`LinkStatus::Ok`]; any other value —
/// including `DEGRADED` — vetoes all outgoing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Ok,
    Degraded,
    Lost,
    /// Any status string this build does not know.  Treated as not-OK.
    #[serde(other)]
    Unknown,
}

// ────────────────────────────────────────────────────────────────────────────
// Audit records
// ────────────────────────────────────────────────────────────────────────────

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// One line of the append-only events log.
///
/// For `MODE_CHANGED` events the note carries `"OLD -> NEW: reason"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub version: String,
    pub time: TimeStamp,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: Severity,
    pub note: String,
}

/// One line of the append-only commands log: every command decision, granted
/// or denied, with its computed parameters and an explicit `allowed` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub version: String,
    pub time: TimeStamp,
    #[serde(rename = "type")]
    pub command: CommandKind,
    pub params: serde_json::Value,
    pub allowed: bool,
    pub note: String,
}

/// Schema version written on every audit record.
pub const RECORD_VERSION: &str = "0.1";

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning file I/O, configuration, and vehicle-sink
/// failures.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("I/O failure on {path}: {details}")]
    Io { path: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vehicle command failed ({command}): {details}")]
    Vehicle { command: String, details: String },

    #[error("Missing input: {0}")]
    MissingInput(String),
}
