//! [`VehicleControl`] – capability contract of the vehicle command sink.
//!
//! The actual transport (MAVLink bridge, serial autopilot link, …) lives
//! outside the decision core; this trait pins down exactly what it must
//! expose.  Dispatch is synchronous and assumed to complete or fail within a
//! bounded timeout.  A failure fails only the current command attempt — the
//! core never retries; connectivity recovery is the link collaborator's job,
//! surfaced back here as a [`LinkStatus`][skytrack_types::LinkStatus].

use skytrack_types::{TrackError, VehicleCommand};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Trait
// ────────────────────────────────────────────────────────────────────────────

/// The three operations the vehicle command sink must expose.
pub trait VehicleControl {
    /// Rotate toward `heading_deg` at `rate_deg_s`, absolute or relative.
    fn set_heading(
        &mut self,
        heading_deg: f64,
        rate_deg_s: f64,
        relative: bool,
    ) -> Result<(), TrackError>;

    /// Switch the vehicle flight mode by name (e.g. `"RTL"`).
    fn set_flight_mode(&mut self, mode: &str) -> Result<(), TrackError>;

    /// Immediate safety stop.
    fn emergency_stop(&mut self) -> Result<(), TrackError>;

    /// Dispatch a [`VehicleCommand`] to the matching operation.
    fn dispatch(&mut self, command: &VehicleCommand) -> Result<(), TrackError> {
        match command {
            VehicleCommand::SetHeading {
                heading_deg,
                rate_deg_s,
                relative,
            } => self.set_heading(*heading_deg, *rate_deg_s, *relative),
            VehicleCommand::SetFlightMode { mode } => self.set_flight_mode(mode),
            VehicleCommand::EmergencyStop => self.emergency_stop(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimVehicle
// ────────────────────────────────────────────────────────────────────────────

/// Recording sink for tests and dry runs.
///
/// Every dispatched command is appended to [`SimVehicle::sent`].  Setting
/// [`SimVehicle::fail_sends`] makes each operation return
/// [`TrackError::Vehicle`] while still recording the attempt, which is how
/// the controller's "mark-sent even on a failing sink" behavior is exercised.
#[derive(Debug, Default)]
pub struct SimVehicle {
    /// Commands received so far, in dispatch order.
    pub sent: Vec<VehicleCommand>,
    /// When `true`, every operation fails after recording.
    pub fail_sends: bool,
}

impl SimVehicle {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, command: VehicleCommand) -> Result<(), TrackError> {
        debug!(command = ?command, fail = self.fail_sends, "sim vehicle dispatch");
        let kind = command.kind();
        self.sent.push(command);
        if self.fail_sends {
            return Err(TrackError::Vehicle {
                command: kind.to_string(),
                details: "simulated sink failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Discarding sink for deployments where the transport runs out of process
/// and the commands log is the actual interface.
#[derive(Debug, Default)]
pub struct NullVehicle;

impl VehicleControl for NullVehicle {
    fn set_heading(&mut self, _: f64, _: f64, _: bool) -> Result<(), TrackError> {
        Ok(())
    }

    fn set_flight_mode(&mut self, _: &str) -> Result<(), TrackError> {
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), TrackError> {
        Ok(())
    }
}

impl VehicleControl for SimVehicle {
    fn set_heading(
        &mut self,
        heading_deg: f64,
        rate_deg_s: f64,
        relative: bool,
    ) -> Result<(), TrackError> {
        self.record(VehicleCommand::SetHeading {
            heading_deg,
            rate_deg_s,
            relative,
        })
    }

    fn set_flight_mode(&mut self, mode: &str) -> Result<(), TrackError> {
        self.record(VehicleCommand::SetFlightMode {
            mode: mode.to_string(),
        })
    }

    fn emergency_stop(&mut self) -> Result<(), TrackError> {
        self.record(VehicleCommand::EmergencyStop)
    }
}
