//! `skytrack-kernel` – Safety interlocks
//!
//! The layer between the decision loop and the vehicle.  It does not decide;
//! it enforces the safety envelope every outgoing command must satisfy.
//!
//! # Modules
//!
//! - [`command_gate`] – [`CommandGate`][command_gate::CommandGate]:
//!   rate/TTL/link interlock that every
//!   [`VehicleCommand`][skytrack_types::VehicleCommand] must pass before it
//!   is forwarded to the vehicle sink.
//! - [`health`] – [`SensorHealth`][health::SensorHealth]:
//!   per-sensor liveness tracker derived from observation provenance, feeding
//!   the controller's degradation policy.
//! - [`vehicle`] – [`VehicleControl`][vehicle::VehicleControl]:
//!   the capability contract the vehicle command sink must expose
//!   (`set_heading` / `set_flight_mode` / `emergency_stop`), plus a recording
//!   [`SimVehicle`][vehicle::SimVehicle] for tests and dry runs.

pub mod command_gate;
pub mod health;
pub mod vehicle;

pub use command_gate::{CommandGate, GateConfig};
pub use health::{HealthStatus, SensorHealth};
pub use vehicle::{NullVehicle, SimVehicle, VehicleControl};
