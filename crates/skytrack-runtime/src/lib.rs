//! `skytrack-runtime` – the decision loop.
//!
//! Hosts the tracking state machine and everything it needs to run over a
//! recorded or live run directory.
//!
//! # Modules
//!
//! - [`controller`] – [`StateController`][controller::StateController]: the
//!   `IDLE → … → TRACK` state machine with health-driven `DEGRADED`/`RETURN`
//!   overlays, consuming one fused observation per step.
//! - [`audit`] – [`AuditLog`][audit::AuditLog]: append-only events and
//!   commands sinks with per-event-type cooldowns.
//! - [`link`] – [`LinkMonitor`][link::LinkMonitor]: newest telemetry link
//!   status, feeding the command gate's veto.
//! - [`replay`] – [`run_replay`][replay::run_replay]: time-ordered,
//!   speed-paced replay of a run's fused log through the controller.
//! - [`logging`] – [`init_tracing`][logging::init_tracing]: subscriber setup
//!   for the binaries.

pub mod audit;
pub mod controller;
pub mod link;
pub mod logging;
pub mod replay;

pub use audit::AuditLog;
pub use controller::{
    ActiveSource, ControllerConfig, DegradationPolicy, DegradeAction, StateController, TrackState,
};
pub use link::LinkMonitor;
pub use logging::init_tracing;
pub use replay::run_replay;
