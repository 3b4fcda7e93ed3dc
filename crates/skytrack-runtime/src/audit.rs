//! [`AuditLog`] – append-only events and commands sinks of one run.
//!
//! Two JSONL files live next to the observation logs: `events.jsonl` for
//! state transitions and other controller events, `commands.jsonl` for every
//! command decision, granted or denied.  Events of the same type are
//! suppressed within a configurable cooldown so a flapping condition cannot
//! flood the log; command decisions are never suppressed.
//!
//! Writing the audit trail must never take the control loop down, so write
//! failures are reported through `tracing` and otherwise swallowed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use skytrack_types::{
    CommandRecord, EventRecord, RECORD_VERSION, Severity, TimeBase, VehicleCommand, jsonl,
};
use tracing::{debug, warn};

/// File name of the events log inside a run directory.
pub const EVENTS_LOG: &str = "events.jsonl";
/// File name of the commands log inside a run directory.
pub const COMMANDS_LOG: &str = "commands.jsonl";

/// Owns both audit sinks, the run's [`TimeBase`], and the per-event-type
/// cooldown map.
pub struct AuditLog {
    events_path: PathBuf,
    commands_path: PathBuf,
    timebase: TimeBase,
    cooldown: Duration,
    last_event: HashMap<String, Instant>,
}

impl AuditLog {
    /// Audit sinks under `run_dir` with the given per-event-type cooldown.
    /// A cooldown ≤ 0 disables suppression.
    pub fn new(run_dir: &Path, event_cooldown_sec: f64) -> Self {
        Self {
            events_path: run_dir.join(EVENTS_LOG),
            commands_path: run_dir.join(COMMANDS_LOG),
            timebase: TimeBase::new(),
            cooldown: Duration::from_secs_f64(event_cooldown_sec.max(0.0)),
            last_event: HashMap::new(),
        }
    }

    /// Current timestamp on this run's timebase.
    pub fn now(&self) -> skytrack_types::TimeStamp {
        self.timebase.now()
    }

    /// Append one event, unless an event of the same type was written within
    /// the cooldown window.  Returns whether the event was written.
    pub fn log_event(&mut self, event_type: &str, severity: Severity, note: &str) -> bool {
        if self.cooldown > Duration::ZERO {
            if let Some(last) = self.last_event.get(event_type) {
                if last.elapsed() < self.cooldown {
                    debug!(event_type, note, "event suppressed by cooldown");
                    return false;
                }
            }
        }
        self.last_event.insert(event_type.to_string(), Instant::now());

        let record = EventRecord {
            version: RECORD_VERSION.to_string(),
            time: self.timebase.now(),
            event_type: event_type.to_string(),
            severity,
            note: note.to_string(),
        };
        if let Err(e) = jsonl::append_record(&self.events_path, &record) {
            warn!(error = %e, "failed to append event record");
        }
        true
    }

    /// Append one command decision.  Every decision is recorded, allowed or
    /// not; there is no cooldown on this sink.
    pub fn log_command(&mut self, command: &VehicleCommand, allowed: bool, note: &str) {
        let record = CommandRecord {
            version: RECORD_VERSION.to_string(),
            time: self.timebase.now(),
            command: command.kind(),
            params: command.params_json(),
            allowed,
            note: note.to_string(),
        };
        if let Err(e) = jsonl::append_record(&self.commands_path, &record) {
            warn!(error = %e, "failed to append command record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skytrack_types::CommandKind;
    use std::thread;

    #[test]
    fn events_carry_version_and_note() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), 0.0);
        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "IDLE -> SEARCH: observation_received"));

        let events: Vec<EventRecord> = jsonl::read_records(&dir.path().join(EVENTS_LOG));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version, RECORD_VERSION);
        assert_eq!(events[0].event_type, "MODE_CHANGED");
        assert!(events[0].note.starts_with("IDLE -> SEARCH"));
    }

    #[test]
    fn cooldown_suppresses_repeats_of_the_same_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), 0.05);

        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "first"));
        assert!(!audit.log_event("MODE_CHANGED", Severity::Info, "second"));

        thread::sleep(Duration::from_millis(60));
        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "third"));

        let events: Vec<EventRecord> = jsonl::read_records(&dir.path().join(EVENTS_LOG));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn cooldowns_are_per_event_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), 1.0);

        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "a"));
        assert!(audit.log_event("SENSOR_FAIL", Severity::Warn, "b"));
        assert!(!audit.log_event("MODE_CHANGED", Severity::Info, "c"));
    }

    #[test]
    fn zero_cooldown_disables_suppression() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), 0.0);
        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "a"));
        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "b"));
    }

    #[test]
    fn every_command_decision_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), 1.0);

        let heading = VehicleCommand::SetHeading {
            heading_deg: 43.33,
            rate_deg_s: 30.0,
            relative: false,
        };
        audit.log_command(&heading, true, "track_target");
        audit.log_command(&heading, false, "track_target");
        audit.log_command(&VehicleCommand::EmergencyStop, true, "stale_command_stop");

        let commands: Vec<CommandRecord> = jsonl::read_records(&dir.path().join(COMMANDS_LOG));
        assert_eq!(commands.len(), 3);
        assert!(commands[0].allowed);
        assert!(!commands[1].allowed);
        assert_eq!(commands[2].command, CommandKind::EmergencyStop);
        assert_eq!(commands[0].params["heading_deg"], 43.33);
    }

    #[test]
    fn unwritable_sink_does_not_panic() {
        let mut audit = AuditLog::new(Path::new("/nonexistent/run"), 0.0);
        assert!(audit.log_event("MODE_CHANGED", Severity::Info, "a"));
        audit.log_command(&VehicleCommand::EmergencyStop, true, "a");
    }
}
