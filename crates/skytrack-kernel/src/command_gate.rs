//! [`CommandGate`] – single interception point between the state controller
//! and the vehicle command sink.
//!
//! Before a [`VehicleCommand`] is dispatched, the controller asks
//! [`CommandGate::can_send`].  The predicate enforces **three independent
//! safety checks**:
//!
//! 1. **Allow-list** – the command's [`CommandKind`] must be configured as
//!    sendable.  Unknown or unlisted kinds are rejected, never an error.
//! 2. **Link veto** – the telemetry link must report exactly
//!    [`LinkStatus::Ok`].  Any other value, including `DEGRADED`, vetoes all
//!    commands unconditionally.
//! 3. **Rate limit** – at least `1 / max_rate_hz` seconds must have elapsed
//!    since the last accepted send.
//!
//! `can_send` is pure: it never mutates the gate.  Callers invoke
//! [`CommandGate::mark_sent`] themselves after actually dispatching — and
//! also after a dispatch that *failed*, so the rate limiter stays effective
//! against a failing sink.
//!
//! # Example
//!
//! ```
//! use skytrack_kernel::{CommandGate, GateConfig};
//! use skytrack_types::{CommandKind, LinkStatus};
//!
//! let mut gate = CommandGate::new(GateConfig::default());
//! assert!(gate.can_send(CommandKind::SetHeading));
//!
//! gate.mark_sent();
//! // Immediately after a send the rate limiter blocks the next one.
//! assert!(!gate.can_send(CommandKind::SetHeading));
//!
//! gate.update_link_status(LinkStatus::Degraded);
//! // A non-OK link vetoes everything, regardless of rate state.
//! assert!(!gate.can_send(CommandKind::EmergencyStop));
//! ```

use std::collections::HashSet;
use std::time::Instant;

use skytrack_types::{CommandKind, LinkStatus};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Static gate policy, owned by the gate for its whole lifetime.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Maximum accepted command rate.  Values ≤ 0 disable rate limiting.
    pub max_rate_hz: f64,
    /// Maximum silence since the last sent command before the gate reports
    /// its command state as stale.  Values ≤ 0 disable the TTL.
    pub command_ttl_sec: f64,
    /// Command kinds the gate may ever approve.
    pub allow_types: HashSet<CommandKind>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_rate_hz: 5.0,
            command_ttl_sec: 1.0,
            allow_types: HashSet::from([
                CommandKind::SetHeading,
                CommandKind::SetFlightMode,
                CommandKind::EmergencyStop,
            ]),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CommandGate
// ────────────────────────────────────────────────────────────────────────────

/// Rate/TTL/link safety interlock guarding outgoing vehicle commands.
///
/// Process-scoped singleton: construct once at start-up and thread it through
/// the control loop.  A restart begins cold — nothing is persisted.
pub struct CommandGate {
    config: GateConfig,
    /// Instant of the last accepted send, for the rate limiter.
    last_send: Option<Instant>,
    /// Instant of the last sent command, for the TTL timer.  Kept separate
    /// from `last_send` so the rate and TTL policies can diverge, though no
    /// current path stamps one without the other.
    last_command: Option<Instant>,
    link_status: LinkStatus,
}

impl CommandGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            last_send: None,
            last_command: None,
            link_status: LinkStatus::Ok,
        }
    }

    /// Feed the newest telemetry link status.  Called by the control loop
    /// before each decision.
    pub fn update_link_status(&mut self, status: LinkStatus) {
        self.link_status = status;
    }

    /// Pure predicate: may a command of `kind` be sent right now?
    pub fn can_send(&self, kind: CommandKind) -> bool {
        if !self.config.allow_types.contains(&kind) {
            return false;
        }
        if self.link_status != LinkStatus::Ok {
            return false;
        }
        if self.config.max_rate_hz > 0.0 {
            let min_interval = 1.0 / self.config.max_rate_hz;
            if let Some(last) = self.last_send {
                if last.elapsed().as_secs_f64() < min_interval {
                    return false;
                }
            }
        }
        true
    }

    /// Record the send instant for both the rate limiter and the TTL timer.
    ///
    /// Callers invoke this only after actually dispatching (or attempting to
    /// dispatch) a command — never implicitly.
    pub fn mark_sent(&mut self) {
        let now = Instant::now();
        self.last_send = Some(now);
        self.last_command = Some(now);
    }

    /// `true` when no command has been sent within the configured TTL.
    ///
    /// The controller uses this to detect staleness and force an explicit
    /// stop — never to auto-resend.  A gate that has never sent anything is
    /// already expired.
    pub fn expired(&self) -> bool {
        if self.config.command_ttl_sec <= 0.0 {
            return false;
        }
        match self.last_command {
            None => true,
            Some(last) => last.elapsed().as_secs_f64() > self.config.command_ttl_sec,
        }
    }
}
