//! [`StateController`] – the tracking state machine.
//!
//! Consumes one time-ordered fused [`Observation`] per step and drives the
//! primary track lifecycle
//! `IDLE → SEARCH → SCAN → LOCKED → TRACK → LOST → SEARCH`, with `DEGRADED`
//! and `RETURN` as health-driven overlay states reachable from anywhere.
//! `RETURN` issues one return-to-launch command and then holds.
//!
//! The controller owns the [`SensorHealth`] monitor, the [`CommandGate`],
//! the [`AuditLog`], and the vehicle sink; it is a process-scoped singleton
//! threaded through the control loop, never shared.  A restart begins cold:
//! `IDLE`, no health history, nothing persisted.
//!
//! Every state transition appends a cooldown-limited `MODE_CHANGED` event
//! with a `"OLD -> NEW: reason"` note; every command decision is appended to
//! the commands log with an explicit `allowed` flag, whether or not the gate
//! let it through.

use std::time::{Duration, Instant};

use serde::Deserialize;
use skytrack_kernel::{CommandGate, HealthStatus, SensorHealth, VehicleControl};
use skytrack_types::{LinkStatus, ObsStatus, Observation, Severity, SourceId, VehicleCommand};
use tracing::{debug, info, warn};

use crate::audit::AuditLog;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// What to do when a sensor failure mode is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeAction {
    /// Keep operating, but only audio contributions may drive commands.
    AudioOnly,
    /// Keep operating, but only vision contributions may drive commands.
    VisionOnly,
    /// Give up and return to launch.
    Return,
}

/// Per-failure-mode degradation actions.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DegradationPolicy {
    pub vision_fail: DegradeAction,
    pub audio_fail: DegradeAction,
    pub both_fail: DegradeAction,
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self {
            vision_fail: DegradeAction::AudioOnly,
            audio_fail: DegradeAction::VisionOnly,
            both_fail: DegradeAction::Return,
        }
    }
}

/// Tunable thresholds and timeouts of the state machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minimum confidence for the SCAN→LOCKED and LOCKED→TRACK promotions.
    pub lock_conf: f64,
    /// Minimum confidence before an audio-only contribution may steer.
    pub audio_trigger_conf: f64,
    /// Silence after the last valid observation before SCAN/LOCKED/TRACK
    /// falls to LOST.
    pub lost_timeout_sec: f64,
    /// Shared liveness window of the sensor health monitor.
    pub sensor_timeout_sec: f64,
    /// Turn rate requested with every heading command.
    pub heading_rate_deg_s: f64,
    /// Per-event-type audit cooldown.
    pub event_cooldown_sec: f64,
    /// Longest tolerated stay in DEGRADED before forcing RETURN.
    pub max_degraded_sec: f64,
    /// Leave DEGRADED for SEARCH once health is fully restored.
    pub auto_recover: bool,
    pub degradation: DegradationPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lock_conf: 0.6,
            audio_trigger_conf: 0.3,
            lost_timeout_sec: 3.0,
            sensor_timeout_sec: 2.0,
            heading_rate_deg_s: 30.0,
            event_cooldown_sec: 1.0,
            max_degraded_sec: 30.0,
            auto_recover: true,
            degradation: DegradationPolicy::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// States
// ────────────────────────────────────────────────────────────────────────────

/// Primary state of the track lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Idle,
    Search,
    Scan,
    Locked,
    Track,
    Lost,
    Degraded,
    Return,
}

impl std::fmt::Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackState::Idle => "IDLE",
            TrackState::Search => "SEARCH",
            TrackState::Scan => "SCAN",
            TrackState::Locked => "LOCKED",
            TrackState::Track => "TRACK",
            TrackState::Lost => "LOST",
            TrackState::Degraded => "DEGRADED",
            TrackState::Return => "RETURN",
        };
        write!(f, "{name}")
    }
}

/// Which contributing source may currently drive heading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSource {
    Fused,
    VisionOnly,
    AudioOnly,
}

// ────────────────────────────────────────────────────────────────────────────
// StateController
// ────────────────────────────────────────────────────────────────────────────

/// The tracking state machine; see the module docs for the lifecycle.
pub struct StateController<V: VehicleControl> {
    config: ControllerConfig,
    state: TrackState,
    active_source: ActiveSource,
    degraded_since: Option<Instant>,
    last_seen: Option<Instant>,
    health: SensorHealth,
    gate: CommandGate,
    audit: AuditLog,
    vehicle: V,
}

impl<V: VehicleControl> StateController<V> {
    pub fn new(config: ControllerConfig, gate: CommandGate, audit: AuditLog, vehicle: V) -> Self {
        let health = SensorHealth::new(Duration::from_secs_f64(config.sensor_timeout_sec.max(0.0)));
        Self {
            config,
            state: TrackState::Idle,
            active_source: ActiveSource::Fused,
            degraded_since: None,
            last_seen: None,
            health,
            gate,
            audit,
            vehicle,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn active_source(&self) -> ActiveSource {
        self.active_source
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }

    /// Feed the newest telemetry link status into the gate.
    pub fn update_link(&mut self, status: LinkStatus) {
        self.gate.update_link_status(status);
    }

    /// Run one control step over an optional fused observation.
    pub fn step(&mut self, obs: Option<&Observation>) {
        // Health first, so the degradation check below sees this step's data.
        if let Some(o) = obs {
            self.stamp_health(o);
        }

        // Health-driven overlays outrank the bearing/confidence machine.
        let action = self.degrade_action();
        if let Some(action) = action {
            if !matches!(self.state, TrackState::Degraded | TrackState::Return) {
                let fallback = match action {
                    DegradeAction::Return => {
                        self.transition(TrackState::Return, "sensor_failure");
                        self.send_return();
                        return;
                    }
                    DegradeAction::AudioOnly => ActiveSource::AudioOnly,
                    DegradeAction::VisionOnly => ActiveSource::VisionOnly,
                };
                self.transition(TrackState::Degraded, "sensor_failure");
                self.degraded_since = Some(Instant::now());
                self.active_source = fallback;
            }
        }

        if self.state == TrackState::Degraded {
            let overdue = self
                .degraded_since
                .is_some_and(|t| t.elapsed().as_secs_f64() > self.config.max_degraded_sec);
            if overdue {
                self.transition(TrackState::Return, "degraded_timeout");
                self.send_return();
                return;
            }
            if action.is_none() && self.config.auto_recover {
                self.transition(TrackState::Search, "sensors_recovered");
                self.active_source = ActiveSource::Fused;
                self.degraded_since = None;
            }
        }

        match obs {
            Some(o) if o.is_valid() => self.on_valid_observation(o),
            _ => self.on_missing_observation(),
        }
    }

    // ── step pieces ─────────────────────────────────────────────────────────

    /// Stamp liveness for every contributor the record names.  A plain
    /// `fusion` record with no contributor list counts for both tracked
    /// sensors, but only when its status is OK.
    fn stamp_health(&mut self, obs: &Observation) {
        let blanket = obs.source == SourceId::Fusion
            && obs.contributors().is_empty()
            && obs.status == ObsStatus::Ok;
        if blanket || obs.names_source(SourceId::Vision) {
            self.health.update_vision();
        }
        if blanket || obs.names_source(SourceId::Audio) {
            self.health.update_audio();
        }
    }

    fn degrade_action(&self) -> Option<DegradeAction> {
        match self.health.status() {
            HealthStatus::AllOk => None,
            HealthStatus::VisionFail => Some(self.config.degradation.vision_fail),
            HealthStatus::AudioFail => Some(self.config.degradation.audio_fail),
            HealthStatus::BothFail => Some(self.config.degradation.both_fail),
        }
    }

    fn on_valid_observation(&mut self, obs: &Observation) {
        self.last_seen = Some(Instant::now());

        if self.state == TrackState::Idle {
            self.transition(TrackState::Search, "observation_received");
        }
        if self.state == TrackState::Search {
            self.transition(TrackState::Scan, "target_detected");
        }

        if !matches!(
            self.state,
            TrackState::Scan | TrackState::Locked | TrackState::Track | TrackState::Degraded
        ) {
            return;
        }

        let confidence = obs.confidence.unwrap_or(0.0);
        if self.steering_warranted(obs, confidence) {
            if let Some(bearing) = obs.bearing_deg {
                self.send_heading(bearing);
            }
        }

        let vision = obs.names_source(SourceId::Vision);
        if self.state == TrackState::Scan && vision && confidence >= self.config.lock_conf {
            self.transition(TrackState::Locked, "target_locked");
        } else if self.state == TrackState::Locked && confidence >= self.config.lock_conf {
            self.transition(TrackState::Track, "tracking");
        }
    }

    fn on_missing_observation(&mut self) {
        if matches!(
            self.state,
            TrackState::Scan | TrackState::Locked | TrackState::Track
        ) {
            let timed_out = self
                .last_seen
                .is_some_and(|t| t.elapsed().as_secs_f64() > self.config.lost_timeout_sec);
            if timed_out {
                self.transition(TrackState::Lost, "observation_timeout");
            }
        } else if self.state == TrackState::Lost && self.gate.expired() {
            // One explicit stop; resume is deliberately held until the TTL
            // confirms nothing of ours is still in flight.
            self.send_stop();
            self.transition(TrackState::Search, "resume_search");
        }
    }

    /// May this observation steer the vehicle under the current source
    /// restriction?
    fn steering_warranted(&self, obs: &Observation, confidence: f64) -> bool {
        let vision = obs.names_source(SourceId::Vision);
        let audio =
            obs.names_source(SourceId::Audio) && confidence >= self.config.audio_trigger_conf;
        match self.active_source {
            ActiveSource::AudioOnly => audio,
            ActiveSource::VisionOnly => vision,
            ActiveSource::Fused => vision || audio,
        }
    }

    // ── commands ────────────────────────────────────────────────────────────

    fn send_heading(&mut self, heading_deg: f64) {
        let command = VehicleCommand::SetHeading {
            heading_deg,
            rate_deg_s: self.config.heading_rate_deg_s,
            relative: false,
        };
        self.send(command, "track_target");
    }

    fn send_return(&mut self) {
        let command = VehicleCommand::SetFlightMode {
            mode: "RTL".to_string(),
        };
        self.send(command, "return_home");
    }

    fn send_stop(&mut self) {
        self.send(VehicleCommand::EmergencyStop, "stale_command_stop");
    }

    /// Gate, log, dispatch.  The gate is stamped after every dispatch
    /// attempt, including a failed one, so the rate limiter stays effective
    /// against a failing sink.
    fn send(&mut self, command: VehicleCommand, note: &str) {
        let allowed = self.gate.can_send(command.kind());
        self.audit.log_command(&command, allowed, note);
        if !allowed {
            debug!(kind = %command.kind(), note, "command denied by gate");
            return;
        }
        if let Err(e) = self.vehicle.dispatch(&command) {
            warn!(error = %e, kind = %command.kind(), "vehicle dispatch failed");
        }
        self.gate.mark_sent();
    }

    fn transition(&mut self, next: TrackState, reason: &str) {
        if next == self.state {
            return;
        }
        let severity = match next {
            TrackState::Return => Severity::Error,
            TrackState::Degraded | TrackState::Lost => Severity::Warn,
            _ => Severity::Info,
        };
        let note = format!("{} -> {}: {}", self.state, next, reason);
        info!(from = %self.state, to = %next, reason, "mode changed");
        self.audit.log_event("MODE_CHANGED", severity, &note);
        self.state = next;
    }
}
