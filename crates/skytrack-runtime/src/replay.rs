//! Time-ordered replay of a run's fused log through the controller.
//!
//! One step fully consumes one record before the next begins; records are
//! never reordered or skipped relative to monotonic time.  `speed` scales
//! the original inter-record gaps (1.0 = real time, 0 = as fast as
//! possible).

use std::path::Path;
use std::thread;
use std::time::Duration;

use skytrack_kernel::VehicleControl;
use skytrack_types::{Observation, TrackError, jsonl};
use tracing::info;

use crate::controller::StateController;
use crate::link::LinkMonitor;

/// Replay `fused.jsonl` under `run_dir`.  Returns the number of steps fed.
///
/// # Errors
///
/// [`TrackError::MissingInput`] when the fused log does not exist — the
/// `fuse` pass has to run first.
pub fn run_replay<V: VehicleControl>(
    run_dir: &Path,
    controller: &mut StateController<V>,
    link: &mut LinkMonitor,
    speed: f64,
) -> Result<usize, TrackError> {
    let path = run_dir.join("fused.jsonl");
    if !path.exists() {
        return Err(TrackError::MissingInput(format!(
            "{} not found; run the fuse step first",
            path.display()
        )));
    }

    let mut records: Vec<Observation> = jsonl::read_records(&path);
    records.sort_by_key(|o| o.time.mono_ms);
    info!(records = records.len(), path = %path.display(), "replay started");

    let mut prev_mono: Option<i64> = None;
    for record in &records {
        if speed > 0.0 {
            if let Some(prev) = prev_mono {
                let gap_ms = (record.time.mono_ms - prev).max(0) as f64 / speed;
                thread::sleep(Duration::from_millis(gap_ms as u64));
            }
        }
        prev_mono = Some(record.time.mono_ms);

        controller.update_link(link.poll());
        controller.step(Some(record));
    }

    info!(steps = records.len(), state = %controller.state(), "replay finished");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, COMMANDS_LOG};
    use crate::controller::{ControllerConfig, TrackState};
    use crate::link::TELEMETRY_LOG;
    use skytrack_kernel::{CommandGate, GateConfig, SimVehicle};
    use skytrack_types::{CommandRecord, ObsExtras, ObsStatus, SourceId, TimeStamp};

    fn fused(mono_ms: i64, bearing: f64, conf: f64) -> Observation {
        Observation {
            version: Some("0.1".to_string()),
            time: TimeStamp {
                mono_ms,
                epoch_ms: mono_ms,
            },
            source: SourceId::Fusion,
            bearing_deg: Some(bearing),
            roi: None,
            confidence: Some(conf),
            status: ObsStatus::Ok,
            extras: Some(ObsExtras {
                sources: vec![SourceId::Vision, SourceId::Audio],
                ..Default::default()
            }),
        }
    }

    fn controller(run_dir: &Path) -> StateController<SimVehicle> {
        let config = ControllerConfig {
            event_cooldown_sec: 0.0,
            ..ControllerConfig::default()
        };
        let gate = GateConfig {
            max_rate_hz: 0.0,
            ..GateConfig::default()
        };
        let audit = AuditLog::new(run_dir, 0.0);
        StateController::new(config, CommandGate::new(gate), audit, SimVehicle::new())
    }

    #[test]
    fn missing_fused_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctrl = controller(dir.path());
        let mut link = LinkMonitor::new(dir.path());

        let result = run_replay(dir.path(), &mut ctrl, &mut link, 0.0);
        assert!(matches!(result, Err(TrackError::MissingInput(_))));
    }

    #[test]
    fn replay_feeds_records_in_monotonic_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fused.jsonl");
        // Written out of order; the replay must sort before stepping.
        jsonl::append_record(&path, &fused(300, 42.0, 0.9)).unwrap();
        jsonl::append_record(&path, &fused(100, 40.0, 0.9)).unwrap();
        jsonl::append_record(&path, &fused(200, 41.0, 0.9)).unwrap();

        let mut ctrl = controller(dir.path());
        let mut link = LinkMonitor::new(dir.path());
        let steps = run_replay(dir.path(), &mut ctrl, &mut link, 0.0).unwrap();

        assert_eq!(steps, 3);
        assert_eq!(ctrl.state(), TrackState::Track);
        assert_eq!(ctrl.vehicle().sent.len(), 3);
        assert!(matches!(
            ctrl.vehicle().sent[0],
            skytrack_types::VehicleCommand::SetHeading { heading_deg, .. } if heading_deg == 40.0
        ));
    }

    #[test]
    fn telemetry_link_vetoes_commands_during_replay() {
        let dir = tempfile::tempdir().unwrap();
        jsonl::append_record(&dir.path().join("fused.jsonl"), &fused(100, 40.0, 0.9)).unwrap();
        std::fs::write(
            dir.path().join(TELEMETRY_LOG),
            "{\"link_status\":\"DEGRADED\"}\n",
        )
        .unwrap();

        let mut ctrl = controller(dir.path());
        let mut link = LinkMonitor::new(dir.path());
        run_replay(dir.path(), &mut ctrl, &mut link, 0.0).unwrap();

        assert!(ctrl.vehicle().sent.is_empty());
        let logged: Vec<CommandRecord> = jsonl::read_records(&dir.path().join(COMMANDS_LOG));
        assert_eq!(logged.len(), 1);
        assert!(!logged[0].allowed);
    }

    #[test]
    fn empty_fused_log_replays_zero_steps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fused.jsonl"), "").unwrap();

        let mut ctrl = controller(dir.path());
        let mut link = LinkMonitor::new(dir.path());
        let steps = run_replay(dir.path(), &mut ctrl, &mut link, 0.0).unwrap();
        assert_eq!(steps, 0);
        assert_eq!(ctrl.state(), TrackState::Idle);
    }
}
